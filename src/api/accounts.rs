use crate::api::auth_middleware::authenticate;
use crate::api::{parse_json, ApiError, AppState};
use crate::auth::extract_bearer_token;
use crate::user::User;
use crate::validation::{LoginPayload, RegisterPayload};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Response for register and login
#[derive(Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: User,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
}

/// POST /auth/register - Create account and start a session
async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let payload: RegisterPayload = parse_json(&body?)?;
    let registration = payload.validate()?;

    let user = state
        .users
        .create(&registration.name, &registration.email, &registration.password)?;
    let session = state.sessions.issue(user.id);

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user,
            token: session.token,
        }),
    ))
}

/// POST /auth/login - Exchange email and password for a session token
async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let payload: LoginPayload = parse_json(&body?)?;
    let credentials = payload.validate()?;

    // Same answer for unknown email and wrong password
    let user = match state.users.find_by_email(&credentials.email)? {
        Some(user) if state.users.verify_credential(&user, &credentials.password) => user,
        _ => {
            warn!(email = %credentials.email, "Login failed");
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    let purged = state.sessions.purge_expired();
    let session = state.sessions.issue(user.id);
    info!(user_id = %user.id, purged_sessions = purged, "User logged in");

    Ok(Json(SessionResponse {
        user,
        token: session.token,
    }))
}

/// GET /auth/me - Current user
async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    Ok(Json(MeResponse { user }))
}

/// POST /auth/logout - End the presented session
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers)?;
    if let Ok(token) = extract_bearer_token(&headers) {
        state.sessions.revoke(&token);
    }
    info!(user_id = %user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
