pub mod assist;
pub mod auth;
pub mod donations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod preferences;


use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Inline data-URL images make create requests larger than axum's default.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Current server time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Every REST route. The gateway upgrade is mounted by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/users/me", get(auth::me))
        .route(
            "/users/me/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        .route(
            "/donations",
            get(donations::list_donations).post(donations::create_donation),
        )
        .route("/donations/map", get(donations::map_donations))
        .route("/donations/{donation_id}", get(donations::get_donation))
        .route("/donations/{donation_id}/claim", post(donations::claim))
        .route("/donations/{donation_id}/deliver", post(donations::deliver))
        .route("/donations/{donation_id}/cancel", post(donations::cancel))
        .route(
            "/donations/{donation_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/donations/{donation_id}/messages/suggest", post(messages::suggest_reply))
        .route("/assist/description", post(assist::describe))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
