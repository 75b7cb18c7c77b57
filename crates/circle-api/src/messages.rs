use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use circle_core::{channel, prompts};
use circle_types::api::{SendMessageRequest, SuggestionResponse};
use circle_types::events::GatewayEvent;
use circle_types::models::Message;

use crate::auth::AppState;
use crate::donations::load_donation;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::now_millis;

/// Append to a donation's coordination channel and push it to watchers.
pub async fn send_message(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let donation = load_donation(&state, donation_id).await?;
    let message = channel::compose(&donation, current.user.id, &req.text, now_millis())?;

    let stored = message.clone();
    state.blocking(move |db| db.insert_message(&stored)).await?;

    debug!("{} posted in donation {}", current.user.id, donation_id);

    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        message: message.clone(),
        donor_id: donation.donor_id,
        volunteer_id: donation.volunteer_id,
    });

    Ok((StatusCode::CREATED, Json(message)))
}

/// The whole thread, oldest first. Never paginated.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let donation = load_donation(&state, donation_id).await?;
    channel::ensure_open(&donation, current.user.id)?;

    let messages = state.blocking(move |db| db.get_messages(donation_id)).await?;
    Ok(Json(messages))
}

/// Draft a reply for the caller. Always 200; `suggestion` is null when the
/// generator is unavailable or fails.
pub async fn suggest_reply(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<SuggestionResponse>, ApiError> {
    let donation = load_donation(&state, donation_id).await?;
    channel::ensure_open(&donation, current.user.id)?;

    let messages = state.blocking(move |db| db.get_messages(donation_id)).await?;
    let prompt = prompts::reply_prompt(
        &donation,
        &messages,
        donation.donor_id == current.user.id,
    );

    Ok(Json(SuggestionResponse {
        suggestion: state.assistant.suggest(&prompt).await,
    }))
}
