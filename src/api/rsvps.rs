use crate::api::auth_middleware::authenticate;
use crate::api::{parse_json, ApiError, AppState};
use crate::rsvp::{Rsvp, RsvpWithEvent};
use crate::validation::{parse_id, RsvpPayload};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct RsvpResponse {
    pub rsvp: Rsvp,
}

#[derive(Serialize)]
pub struct RsvpListResponse {
    pub items: Vec<RsvpWithEvent>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/:id/rsvp", post(rsvp))
        .route("/rsvps/me", get(my_rsvps))
}

/// POST /events/:id/rsvp - Set the caller's RSVP and sync the attendee list
///
/// 409 when a "yes" finds the event full. The RSVP is still recorded.
async fn rsvp(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<RsvpResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let event_id = parse_id(&id)?;
    let payload: RsvpPayload = parse_json(&body?)?;
    let change = payload.validate()?;

    let rsvp = state
        .attendance
        .apply_rsvp(event_id, user.id, change.status, change.note.as_deref())?;

    Ok(Json(RsvpResponse { rsvp }))
}

/// GET /rsvps/me - The caller's RSVPs with event and organizer
async fn my_rsvps(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RsvpListResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let items = state.rsvps.find_by_user(user.id)?;
    Ok(Json(RsvpListResponse { items }))
}
