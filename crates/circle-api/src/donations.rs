use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use circle_core::donation;
use circle_core::lifecycle::{self, Transition};
use circle_core::projection::{self, DashboardFilter, DashboardView, DetailView, MapView};
use circle_types::api::{CreateDonationRequest, DonationQuery};
use circle_types::events::GatewayEvent;
use circle_types::models::{Donation, Role};

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::now_millis;

pub async fn create_donation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if current.user.role != Role::Donor {
        return Err(ApiError::Forbidden("only donors can list donations".into()));
    }

    let donation = donation::new_donation(req, &current.user, now_millis())?;

    let stored = donation.clone();
    state.blocking(move |db| db.insert_donation(&stored)).await?;

    info!("{} listed donation {} ({})", current.user.id, donation.id, donation.title);

    state.dispatcher.broadcast(GatewayEvent::DonationUpsert {
        donation: donation.clone(),
        previous_status: None,
    });

    Ok((
        StatusCode::CREATED,
        Json(projection::detail(donation, &current.user.viewer())),
    ))
}

pub async fn list_donations(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<DonationQuery>,
) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(dashboard(&state, &current, &query).await?))
}

pub async fn map_donations(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<DonationQuery>,
) -> Result<Json<MapView>, ApiError> {
    let view = dashboard(&state, &current, &query).await?;
    Ok(Json(projection::map_view(&view.donations)))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<DetailView>, ApiError> {
    let viewer = current.user.viewer();
    let donation = load_donation(&state, donation_id).await?;

    // Records outside the viewer's dashboard are reported as missing.
    if !projection::visible_to(&donation, &viewer) {
        return Err(ApiError::NotFound("donation"));
    }

    Ok(Json(projection::detail(donation, &viewer)))
}

pub async fn claim(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<DetailView>, ApiError> {
    transition(&state, &current, donation_id, Transition::Claim).await
}

pub async fn deliver(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<DetailView>, ApiError> {
    transition(&state, &current, donation_id, Transition::Deliver).await
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<DetailView>, ApiError> {
    transition(&state, &current, donation_id, Transition::Cancel).await
}

pub(crate) async fn load_donation(state: &AppStateInner, donation_id: Uuid) -> Result<Donation, ApiError> {
    state
        .blocking(move |db| db.get_donation(donation_id))
        .await?
        .ok_or(ApiError::NotFound("donation"))
}

async fn dashboard(
    state: &AppStateInner,
    current: &CurrentUser,
    query: &DonationQuery,
) -> Result<DashboardView, ApiError> {
    let viewer = current.user.viewer();
    let records = state.blocking(move |db| db.list_donations_for(&viewer)).await?;
    Ok(projection::project(records, &DashboardFilter::from(query), &viewer))
}

/// Guard, then write conditionally on the status the guard saw. A lost race
/// surfaces as a conflict and nothing is broadcast.
async fn transition(
    state: &AppStateInner,
    current: &CurrentUser,
    donation_id: Uuid,
    t: Transition,
) -> Result<Json<DetailView>, ApiError> {
    let viewer = current.user.viewer();
    let donation = load_donation(state, donation_id).await?;

    let applied = lifecycle::authorize(&donation, &viewer, t)?;

    let stored = state
        .blocking(move |db| {
            db.transition_donation(applied.donation_id, applied.from, applied.to, applied.volunteer_id)
        })
        .await?;

    if !stored {
        warn!(
            "{:?} on {} by {} lost a race (expected {})",
            t, donation_id, viewer.id, applied.from
        );
        return Err(ApiError::Conflict(
            "this donation was just updated by someone else, refresh and try again".into(),
        ));
    }

    let updated = lifecycle::apply(donation, &applied);
    info!("donation {} {} -> {} by {}", donation_id, applied.from, applied.to, viewer.id);

    state.dispatcher.broadcast(GatewayEvent::DonationUpsert {
        donation: updated.clone(),
        previous_status: Some(applied.from),
    });

    Ok(Json(projection::detail(updated, &viewer)))
}
