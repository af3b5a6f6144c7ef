//! Request entry point: correlation id and bearer-token gate.
//!
//! Runs in front of every route. Each request gets a fresh [`RequestContext`]
//! (available to handlers as an extension) and every response, errors
//! included, is stamped with the `x-request-id` header. Paths under `/v1/`
//! are rejected with `invalid_api_key` unless the bearer token matches.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::server::error::ApiError;
use crate::server::openai_api::AppState;

/// Response header carrying the correlation id.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Per-request identity.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Id stamped on every completion object produced for this request.
    pub fn completion_id(&self) -> String {
        format!("chatcmpl-{}", self.request_id)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact match of `Authorization: Bearer <key>`.
pub fn is_authorized(headers: &HeaderMap, api_key: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == api_key)
}

pub async fn gate(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let ctx = RequestContext::new();
    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = if req.uri().path().starts_with("/v1/")
        && !is_authorized(req.headers(), &state.config.auth.api_key)
    {
        span.in_scope(|| warn!("Rejected request with invalid API key"));
        ApiError::InvalidApiKey.into_response()
    } else {
        req.extensions_mut().insert(ctx.clone());
        next.run(req).instrument(span).await
    };

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_bearer_match() {
        assert!(is_authorized(&headers_with("Bearer sk-1"), "sk-1"));
    }

    #[test]
    fn test_bearer_rejections() {
        assert!(!is_authorized(&HeaderMap::new(), "sk-1"));
        assert!(!is_authorized(&headers_with("Bearer sk-2"), "sk-1"));
        assert!(!is_authorized(&headers_with("bearer sk-1"), "sk-1"));
        assert!(!is_authorized(&headers_with("sk-1"), "sk-1"));
        assert!(!is_authorized(&headers_with("Bearer  sk-1"), "sk-1"));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.request_id, b.request_id);
        assert!(a.completion_id().starts_with("chatcmpl-"));
    }
}
