use crate::attendance::AttendanceError;
use crate::user::DirectoryError;
use crate::validation::{FieldError, ValidationErrors};
use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

/// Error response body. `errors` is only present for validation failures.
#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Payload failed validation
    Validation(Vec<FieldError>),
    /// Body is not JSON of the expected shape
    BadRequest(String),
    /// Missing, invalid or expired session, or bad credentials
    Unauthorized(String),
    /// Authenticated but not the organizer
    Forbidden,
    NotFound(String),
    /// Event has no free attendee slot
    CapacityExceeded,
    /// Unique constraint, e.g. email already registered
    Conflict(String),
    PayloadTooLarge,
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::CapacityExceeded | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn event_not_found() -> Self {
        ApiError::NotFound("Event not found".to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(_) => write!(f, "Validation failed"),
            ApiError::BadRequest(msg) => write!(f, "{}", msg),
            ApiError::Unauthorized(msg) => write!(f, "{}", msg),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "{}", msg),
            ApiError::CapacityExceeded => write!(f, "Event is at full capacity"),
            ApiError::Conflict(msg) => write!(f, "{}", msg),
            ApiError::PayloadTooLarge => write!(f, "Request body too large"),
            ApiError::Internal(_) => write!(f, "Internal server error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let errors = match self {
            ApiError::Validation(errors) => errors,
            ApiError::Internal(e) => {
                error!(error = %format!("{:#}", e), "Request failed");
                Vec::new()
            }
            _ => Vec::new(),
        };

        (status, Json(ErrorResponse { message, errors })).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.into_errors())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::DuplicateEmail => ApiError::Conflict("Email already registered".to_string()),
            DirectoryError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<AttendanceError> for ApiError {
    fn from(e: AttendanceError) -> Self {
        match e {
            AttendanceError::NotFound => ApiError::event_not_found(),
            AttendanceError::CapacityExceeded { .. } => ApiError::CapacityExceeded,
            AttendanceError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!("Request body over size limit");
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}
