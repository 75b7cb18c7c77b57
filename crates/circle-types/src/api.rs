use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DonationType, InitialView, Role, StatusFilter, Theme, User};

// -- JWT Claims --

/// JWT claims shared across circle-api (REST middleware) and circle-gateway
/// (WebSocket authentication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Session id; the token is only honoured while this session exists.
    pub sid: Uuid,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub token: String,
    pub user: User,
}

// -- Donations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateDonationRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: DonationType,
    pub location: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DonationQuery {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub search: Option<String>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
}

// -- Assist --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptionRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DonationType,
}

/// Best-effort generated text; `None` when the generator is unavailable.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub suggestion: Option<String>,
}

// -- Preferences --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default)]
    pub initial_view: Option<InitialView>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
