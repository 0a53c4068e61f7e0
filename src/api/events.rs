use crate::api::auth_middleware::{authenticate, optional_user};
use crate::api::{parse_json, ApiError, AppState};
use crate::event::{Event, EventFilter, FieldUpdate};
use crate::user::{User, UserSummary};
use crate::validation::{
    capacity_below_attendees, parse_id, CreateEventPayload, UpdateEventPayload,
};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Event as returned by the API, organizer expanded.
///
/// `A` is `Uuid` for listings and writes, `UserSummary` for the detail view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView<A> {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: u32,
    pub organizer: UserSummary,
    pub attendees: Vec<A>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<A> EventView<A> {
    fn build(event: Event, organizer: UserSummary, attendees: Vec<A>) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            location: event.location,
            start_time: event.start_time,
            end_time: event.end_time,
            capacity: event.capacity,
            organizer,
            attendees,
            is_public: event.is_public,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

impl EventView<Uuid> {
    pub fn new(mut event: Event, organizer: UserSummary) -> Self {
        let attendees = std::mem::take(&mut event.attendees);
        Self::build(event, organizer, attendees)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Title search
    pub q: Option<String>,
    /// "true" lists the caller's own events
    pub my: Option<String>,
}

#[derive(Serialize)]
pub struct EventListResponse {
    pub items: Vec<EventView<Uuid>>,
}

#[derive(Serialize)]
pub struct EventResponse<A> {
    pub event: EventView<A>,
}

#[derive(Serialize)]
pub struct AttendeesResponse {
    pub attendees: Vec<UserSummary>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/:id/attendees", get(list_attendees))
}

/// GET /events - Public events, or the caller's own with `my=true`
async fn list_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<EventListResponse>, ApiError> {
    // Without a valid session `my=true` quietly falls back to public events
    let mut filter = match query.my.as_deref() {
        Some("true") => match optional_user(&state, &headers)? {
            Some(user) => EventFilter::organized_by(user.id),
            None => EventFilter::public(),
        },
        _ => EventFilter::public(),
    };
    if let Some(q) = query.q {
        filter = filter.with_search(q);
    }

    let items = state
        .events
        .find(&filter)?
        .into_iter()
        .map(|(event, organizer)| EventView::new(event, organizer))
        .collect();

    Ok(Json(EventListResponse { items }))
}

/// GET /events/:id - Event with organizer and attendee profiles
async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse<UserSummary>>, ApiError> {
    let id = parse_id(&id)?;
    let event = state.events.find_by_id(id)?.ok_or_else(ApiError::event_not_found)?;

    let organizer = organizer_of(&state, &event)?;
    let attendees = state.events.attendees(id)?;

    Ok(Json(EventResponse {
        event: EventView::build(event, organizer, attendees),
    }))
}

/// POST /events - Create an event organized by the caller
async fn create_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<EventResponse<Uuid>>), ApiError> {
    let user = authenticate(&state, &headers)?;
    let payload: CreateEventPayload = parse_json(&body?)?;
    let new_event = payload.validate()?;

    let event = state.events.create(new_event, user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            event: EventView::new(event, user.summary()),
        }),
    ))
}

/// PUT /events/:id - Partial update, organizer only
async fn update_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<EventResponse<Uuid>>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let id = parse_id(&id)?;
    let payload: UpdateEventPayload = parse_json(&body?)?;

    let current = load_owned(&state, id, &user)?;
    let patch = payload.validate(&current)?;
    if patch.is_empty() {
        return Ok(Json(EventResponse {
            event: EventView::new(current, user.summary()),
        }));
    }

    let event = match state.events.update_fields(id, &patch)? {
        FieldUpdate::Updated(event) => event,
        FieldUpdate::CapacityBelowAttendees { attending } => {
            return Err(capacity_below_attendees(attending).into())
        }
        FieldUpdate::EventMissing => return Err(ApiError::event_not_found()),
    };
    info!(event_id = %id, user_id = %user.id, "Event updated");

    Ok(Json(EventResponse {
        event: EventView::new(event, user.summary()),
    }))
}

/// DELETE /events/:id - Remove event and its RSVPs, organizer only
async fn delete_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers)?;
    let id = parse_id(&id)?;
    load_owned(&state, id, &user)?;

    if !state.events.delete(id)? {
        return Err(ApiError::event_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /events/:id/attendees - Attendee profiles in admission order
async fn list_attendees(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AttendeesResponse>, ApiError> {
    let id = parse_id(&id)?;
    if state.events.find_by_id(id)?.is_none() {
        return Err(ApiError::event_not_found());
    }
    let attendees = state.events.attendees(id)?;
    Ok(Json(AttendeesResponse { attendees }))
}

/// Loads an event the caller organizes: 404 if missing, 403 if not theirs.
fn load_owned(state: &AppState, id: Uuid, user: &User) -> Result<Event, ApiError> {
    let event = state.events.find_by_id(id)?.ok_or_else(ApiError::event_not_found)?;
    if !event.is_organized_by(user.id) {
        return Err(ApiError::Forbidden);
    }
    Ok(event)
}

fn organizer_of(state: &AppState, event: &Event) -> Result<UserSummary, ApiError> {
    let organizer = state
        .users
        .summary(event.organizer)?
        .with_context(|| format!("Organizer {} of event {} missing", event.organizer, event.id))?;
    Ok(organizer)
}
