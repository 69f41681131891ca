//! HTTP error handling
//!
//! Every failure leaves the server as `{ "message", "code", "details"? }` where
//! `code` is the engine's stable error kind (`NOT_FOUND`, `CONFLICT`, ...).

use arbor_core::{ErrorKind, NodeServiceError};
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// Optional detailed error information for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }

    /// Malformed or incomplete request input
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(message, ErrorKind::InvalidArgument.as_str())
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "INVALID_ARGUMENT" | "CIRCULAR_DEPENDENCY" => StatusCode::BAD_REQUEST,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<NodeServiceError> for HttpError {
    fn from(err: NodeServiceError) -> Self {
        let kind = err.kind();
        match kind {
            ErrorKind::Internal => {
                tracing::error!("Request failed: {:#}", err);
                HttpError::with_details("Internal server error", kind.as_str(), err.to_string())
            }
            _ => HttpError::new(err.to_string(), kind.as_str()),
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::with_details(
            "Request body is not valid JSON for this endpoint",
            ErrorKind::InvalidArgument.as_str(),
            rejection.body_text(),
        )
    }
}

impl From<PathRejection> for HttpError {
    fn from(rejection: PathRejection) -> Self {
        HttpError::with_details(
            "Invalid ID format",
            ErrorKind::InvalidArgument.as_str(),
            rejection.body_text(),
        )
    }
}
