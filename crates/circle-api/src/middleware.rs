use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use circle_types::models::User;
use circle_types::token;

use crate::auth::AppState;
use crate::error::ApiError;

/// The authenticated caller, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Uuid,
}

/// Validate the bearer JWT and check that its session is still live.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let claims = token::verify(&state.jwt_secret, token)
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".into()))?;

    let session_id = claims.sid;
    let user = state
        .blocking(move |db| db.get_session_user(session_id))
        .await?
        .filter(|u| u.id == claims.sub)
        .ok_or_else(|| ApiError::Unauthorized("session has ended, please log in again".into()))?;

    req.extensions_mut().insert(CurrentUser { user, session_id });
    Ok(next.run(req).await)
}
