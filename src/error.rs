use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::response::ApiBody;

/// Domain error carrying its HTTP status.
///
/// Everything below the request layer returns `Result<_, ApiError>`; the
/// `IntoResponse` impl converts the error into the response envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Option<Value>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] mongodb::error::Error),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            errors: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation {
            message: "Validation error".into(),
            errors: serde_json::to_value(&errors).ok(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, errors) = match self {
            ApiError::Validation { message, errors } => (message, errors),
            ApiError::Database(e) => {
                error!(error = %e, "database error");
                ("Internal Server Error".into(), None)
            }
            ApiError::Internal(msg) => {
                error!(message = %msg, "internal error");
                ("Internal Server Error".into(), None)
            }
            other => (other.to_string(), None),
        };
        (status, Json(ApiBody::failure(message, errors))).into_response()
    }
}
