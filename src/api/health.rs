use crate::api::AppState;
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    /// "connected", "ephemeral" (in-memory, not configured) or "unavailable"
    pub status: &'static str,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /health - Always 200; storage problems show up in `database.status`
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_status = match state.database.ping() {
        Ok(()) if state.database.is_ephemeral() => "ephemeral",
        Ok(()) => "connected",
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok",
        message: "Service is healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        environment: state.environment.clone(),
        database: DatabaseHealth { status: db_status },
    })
}
