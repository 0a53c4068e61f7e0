use crate::api::{ApiError, AppState};
use crate::auth::extract_bearer_token;
use crate::user::User;
use axum::http::HeaderMap;
use tracing::{debug, warn};

/// Resolves the bearer session in `headers` to its user.
///
/// # Errors
/// - Unauthorized: header missing or malformed, session unknown or expired,
///   or the user behind the session no longer exists
/// - Internal: user lookup failed
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = extract_bearer_token(headers).map_err(|e| {
        debug!(reason = %e, "Rejected request without usable token");
        ApiError::Unauthorized("Unauthorized".to_string())
    })?;

    let user_id = state.sessions.resolve(&token).ok_or_else(|| {
        warn!("Unknown or expired session token");
        ApiError::Unauthorized("Unauthorized".to_string())
    })?;

    match state.users.find_by_id(user_id)? {
        Some(user) => Ok(user),
        None => {
            // Session outlived its account
            state.sessions.revoke(&token);
            warn!(user_id = %user_id, "Session for missing user");
            Err(ApiError::Unauthorized("Unauthorized".to_string()))
        }
    }
}

/// Like `authenticate`, but an absent or invalid session is simply `None`.
pub fn optional_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    match authenticate(state, headers) {
        Ok(user) => Ok(Some(user)),
        Err(ApiError::Unauthorized(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::Database;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Arc::new(Database::in_memory().unwrap()), &AppConfig::default())
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_authenticate_valid_session() {
        let state = state();
        let user = state.users.create("Ann", "ann@example.com", "secret1").unwrap();
        let session = state.sessions.issue(user.id);

        let resolved = authenticate(&state, &bearer(&session.token)).unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[test]
    fn test_authenticate_rejects_missing_and_unknown_tokens() {
        let state = state();

        let err = authenticate(&state, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = authenticate(&state, &bearer("not-a-session")).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_authenticate_revoked_session() {
        let state = state();
        let user = state.users.create("Ann", "ann@example.com", "secret1").unwrap();
        let session = state.sessions.issue(user.id);
        state.sessions.revoke(&session.token);

        assert!(authenticate(&state, &bearer(&session.token)).is_err());
    }

    #[test]
    fn test_optional_user() {
        let state = state();
        assert!(optional_user(&state, &HeaderMap::new()).unwrap().is_none());

        let user = state.users.create("Ann", "ann@example.com", "secret1").unwrap();
        let session = state.sessions.issue(user.id);
        let found = optional_user(&state, &bearer(&session.token)).unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[test]
    fn test_session_for_deleted_account_is_revoked() {
        let state = state();
        let session = state.sessions.issue(uuid::Uuid::now_v7());

        assert!(authenticate(&state, &bearer(&session.token)).is_err());
        assert_eq!(state.sessions.count(), 0);
    }
}
