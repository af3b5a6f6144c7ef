//! Uniform OpenAI-style error envelope.
//!
//! Every failure the gateway reports renders as
//! `{ "error": { "message", "type", "code"? } }` with a status matching its kind.

use std::any::Any;

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::upstream::client::UpstreamError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    /// The body extractor refused the request before it could be parsed.
    #[error("{message}")]
    BodyRejected { status: StatusCode, message: String },

    #[error("invalid authentication credentials; expected \"Authorization: Bearer YOUR_KEY\"")]
    InvalidApiKey,

    #[error("endpoint not found: {method} {path}")]
    NotFound { method: String, path: String },

    #[error("upstream service error: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("{0}")]
    BadGateway(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::BodyRejected { status, .. } => *status,
            ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::BodyRejected { .. }
            | ApiError::InvalidApiKey
            | ApiError::NotFound { .. } => "invalid_request_error",
            ApiError::UpstreamStatus { .. } | ApiError::BadGateway(_) | ApiError::Internal(_) => {
                "api_error"
            }
        }
    }

    pub fn code(&self) -> Option<String> {
        match self {
            ApiError::InvalidRequest(_) => None,
            ApiError::BodyRejected { status, .. } => match *status {
                StatusCode::PAYLOAD_TOO_LARGE => Some("request_too_large".to_string()),
                _ => None,
            },
            ApiError::InvalidApiKey => Some("invalid_api_key".to_string()),
            ApiError::NotFound { .. } => Some("not_found".to_string()),
            ApiError::UpstreamStatus { status, .. } => Some(format!("upstream_{status}")),
            ApiError::BadGateway(_) => Some("bad_gateway".to_string()),
            ApiError::Internal(_) => Some("internal_server_error".to_string()),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                message: self.to_string(),
                kind: self.kind(),
                code: self.code(),
            },
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        ApiError::BodyRejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Status { status, body } => ApiError::UpstreamStatus { status, body },
            UpstreamError::Decode(_) => {
                ApiError::BadGateway("unable to parse upstream response".to_string())
            }
            UpstreamError::MissingSummary => ApiError::BadGateway(
                "upstream response is missing a string 'summary' field".to_string(),
            ),
            UpstreamError::Transport(e) => {
                ApiError::BadGateway(format!("internal server error: {e}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

/// Render a caught handler panic as the uniform 500 envelope.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(detail = %detail, "Handler panicked");
    ApiError::Internal(detail).into_response()
}
