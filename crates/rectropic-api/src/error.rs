use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::access::Denial;
use crate::quota::QuotaExceeded;

/// Every failure a handler can report. Rendered as `{"error": "<reason>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed resource doesn't exist. Carries the reason code.
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(Denial),

    #[error("quota-exceeded")]
    QuotaExceeded(QuotaExceeded),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("invalid-input: {0}")]
    InvalidInput(String),

    /// Expired, malformed, wrongly signed, or pointing at a missing user.
    /// Never more specific than this on the wire.
    #[error("invalid-credential")]
    InvalidCredential,

    #[error("internal: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(denial) => denial.status(),
            Self::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The machine-readable reason sent to the client.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(reason) | Self::Conflict(reason) => reason,
            Self::Forbidden(denial) => denial.reason(),
            Self::QuotaExceeded(_) => "quota-exceeded",
            Self::InvalidInput(_) => "invalid-input",
            Self::InvalidCredential => "invalid-credential",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::InvalidInput(msg) => json!({ "error": self.reason(), "message": msg }),
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                json!({ "error": self.reason() })
            }
            Self::Forbidden(_) | Self::QuotaExceeded(_) => {
                warn!("Request denied: {}", self);
                json!({ "error": self.reason() })
            }
            _ => json!({ "error": self.reason() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}
