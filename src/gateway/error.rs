//! Handler-boundary errors and their JSON envelope.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::game::{GameStateError, QuestionRejection};
use crate::prompt::UnsupportedRole;
use crate::providers::RelayError;

const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";
const RESET_FAILED_MESSAGE: &str = "Failed to reset game";

/// Every failure a handler can report. Rendered as
/// `{"success": false, "error": ..., "details"?: ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    GameState(#[from] GameStateError),

    #[error("Invalid JSON in request body")]
    MalformedPayload,

    #[error("{}", .0.summary())]
    BackendConnection(RelayError),

    #[error("{}", .0.summary())]
    BackendResponse(RelayError),

    #[error("{message}")]
    Unexpected {
        message: &'static str,
        cause: anyhow::Error,
    },
}

impl ApiError {
    pub fn unexpected(cause: anyhow::Error) -> Self {
        Self::Unexpected {
            message: UNEXPECTED_MESSAGE,
            cause,
        }
    }

    pub fn reset_failed(cause: anyhow::Error) -> Self {
        Self::Unexpected {
            message: RESET_FAILED_MESSAGE,
            cause,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::GameState(_) | Self::MalformedPayload => {
                StatusCode::BAD_REQUEST
            }
            Self::BackendConnection(_) | Self::BackendResponse(_) | Self::Unexpected { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            Self::BackendConnection(err) | Self::BackendResponse(err) => Some(err.detail()),
            _ => None,
        }
    }

    /// JSON body without the `success` flag, as used inside SSE error events.
    pub fn envelope(&self) -> serde_json::Value {
        let mut body = serde_json::json!({ "error": self.to_string() });
        if let Some(details) = self.details() {
            body["details"] = serde_json::Value::String(details.to_string());
        }
        body
    }
}

impl From<QuestionRejection> for ApiError {
    fn from(rejection: QuestionRejection) -> Self {
        Self::Validation(rejection.to_string())
    }
}

impl From<UnsupportedRole> for ApiError {
    fn from(err: UnsupportedRole) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::Validation("Request body too large".into())
        } else {
            tracing::debug!("Failed to read request body: {}", rejection.body_text());
            Self::MalformedPayload
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::ConnectionFailure(_) => Self::BackendConnection(err),
            RelayError::BackendError { .. } | RelayError::MalformedResponse(_) => {
                Self::BackendResponse(err)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Unexpected { cause, .. } => {
                tracing::error!(status = status.as_u16(), "Request failed: {cause:#}");
            }
            Self::BackendConnection(err) | Self::BackendResponse(err) => {
                tracing::error!(status = status.as_u16(), detail = err.detail(), "{}", err.summary());
            }
            _ => tracing::debug!(status = status.as_u16(), "Request rejected: {self}"),
        }

        let mut body = self.envelope();
        body["success"] = serde_json::Value::Bool(false);
        (status, Json(body)).into_response()
    }
}
