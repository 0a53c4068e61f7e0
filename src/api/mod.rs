// HTTP API: accounts, events, RSVPs and health

pub mod accounts;
pub mod auth_middleware;
pub mod error;
pub mod events;
pub mod health;
pub mod rsvps;

pub use error::ApiError;

use crate::attendance::AttendanceCoordinator;
use crate::auth::SessionRegistry;
use crate::config::AppConfig;
use crate::db::Database;
use crate::event::EventStore;
use crate::rsvp::RsvpStore;
use crate::user::{Argon2PasswordHasher, UserDirectory};
use axum::{body::Bytes, extract::DefaultBodyLimit, Router};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state
pub struct AppState {
    pub database: Arc<Database>,
    pub users: UserDirectory,
    pub events: Arc<EventStore>,
    pub rsvps: Arc<RsvpStore>,
    pub attendance: AttendanceCoordinator,
    pub sessions: SessionRegistry,
    /// Reported by /health
    pub environment: String,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(database: Arc<Database>, config: &AppConfig) -> Self {
        let hasher = Arc::new(Argon2PasswordHasher::new());
        let events = Arc::new(EventStore::new(database.clone()));
        let rsvps = Arc::new(RsvpStore::new(database.clone()));

        Self {
            users: UserDirectory::new(database.clone(), hasher),
            attendance: AttendanceCoordinator::new(events.clone(), rsvps.clone()),
            events,
            rsvps,
            sessions: SessionRegistry::with_ttl_hours(config.auth.session_ttl_hours),
            environment: config.server.environment.clone(),
            max_body_bytes: config.api.max_body_bytes,
            database,
        }
    }
}

/// Builds the full router with body limit, CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .merge(accounts::routes())
        .merge(events::routes())
        .merge(rsvps::routes())
        .merge(health::routes())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Decodes a JSON request body.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Request body is required".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}
