use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use circle_db::Database;
use circle_types::api::PreferencesUpdate;
use circle_types::models::Preferences;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::CurrentUser;

/// The one way preferences change: merge, persist, return what is now stored.
pub fn apply_update(db: &Database, user_id: Uuid, update: PreferencesUpdate) -> anyhow::Result<Preferences> {
    let mut prefs = db.get_preferences(user_id)?;
    if let Some(theme) = update.theme {
        prefs.theme = theme;
    }
    if let Some(view) = update.initial_view {
        prefs.initial_view = view;
    }
    db.set_preferences(user_id, &prefs)?;
    Ok(prefs)
}

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Preferences>, ApiError> {
    let user_id = current.user.id;
    Ok(Json(state.blocking(move |db| db.get_preferences(user_id)).await?))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<Preferences>, ApiError> {
    let user_id = current.user.id;
    Ok(Json(state.blocking(move |db| apply_update(db, user_id, update)).await?))
}
