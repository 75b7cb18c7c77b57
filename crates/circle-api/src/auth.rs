use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};
use uuid::Uuid;

use circle_db::Database;
use circle_gateway::Dispatcher;
use circle_types::api::{AuthResponse, LoginRequest, RegisterRequest};
use circle_types::events::GatewayEvent;
use circle_types::models::User;
use circle_types::token;

use crate::assist::Assistant;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub assistant: Assistant,
}

impl AppStateInner {
    /// Run a blocking DB call off the async runtime.
    pub async fn blocking<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal
            })?
            .map_err(ApiError::from)
    }
}

const MIN_PASSWORD_LEN: usize = 6;
const MAX_NAME_LEN: usize = 64;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "Name must be between 1 and {MAX_NAME_LEN} characters"
        )));
    }
    let email = normalize_email(&req.email)
        .ok_or_else(|| ApiError::Validation("Invalid email address".into()))?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("password hashing failed: {}", e);
            ApiError::Internal
        })?
        .to_string();

    let avatar_url = match req.avatar_url.map(|u| u.trim().to_string()) {
        Some(url) if !url.is_empty() => url,
        _ => default_avatar_url(&name),
    };

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        role: req.role,
        avatar_url,
    };

    let session_id = Uuid::new_v4();
    let stored = user.clone();
    let created = state
        .blocking(move |db| db.create_user(&stored, &password_hash, session_id))
        .await?;
    if !created {
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    let token = issue_token(&state, &user, session_id)?;
    info!("registered {} ({}) as {}", user.name, user.id, user.role);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            token,
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let email = normalize_email(&req.email).ok_or_else(invalid)?;
    let row = state
        .blocking(move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(invalid)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&row.password).map_err(|e| {
        error!("stored password hash is unreadable: {}", e);
        ApiError::Internal
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let user = row.into_user()?;
    let session_id = Uuid::new_v4();
    let user_id = user.id;
    state.blocking(move |db| db.create_session(session_id, user_id)).await?;

    let token = issue_token(&state, &user, session_id)?;

    Ok(Json(AuthResponse {
        user_id: user.id,
        token,
        user,
    }))
}

/// End the caller's session. Gateway connections opened with it are told and closed.
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = current.session_id;
    state.blocking(move |db| db.delete_session(session_id)).await?;

    state
        .dispatcher
        .send_to_session(session_id, GatewayEvent::SessionEnded)
        .await;

    info!("{} ({}) logged out", current.user.name, current.user.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}

fn issue_token(state: &AppStateInner, user: &User, session_id: Uuid) -> Result<String, ApiError> {
    token::issue(&state.jwt_secret, user.id, session_id, user.role).map_err(|e| {
        error!("token signing failed: {}", e);
        ApiError::Internal
    })
}

/// Lower-cased, trimmed address with something on both sides of the '@'.
fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    Some(email)
}

fn default_avatar_url(name: &str) -> String {
    let name = if name.is_empty() { "K" } else { name };
    let params = [
        ("name", name),
        ("background", "10b981"),
        ("color", "fff"),
        ("bold", "true"),
    ];
    reqwest::Url::parse_with_params("https://ui-avatars.com/api/", &params)
        .map(String::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM "), Some("ada@example.com".into()));
        assert_eq!(normalize_email("ada.example.com"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("ada@localhost"), None);
    }

    #[test]
    fn avatar_url_encodes_name() {
        let url = default_avatar_url("Ada Lovelace");
        assert!(url.starts_with("https://ui-avatars.com/api/?name=Ada+Lovelace"));
        assert!(url.ends_with("&background=10b981&color=fff&bold=true"));
    }
}
