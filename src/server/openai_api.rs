//! OpenAI-compatible HTTP API.
//!
//! Implements the subset of the OpenAI API the gateway fronts:
//! - POST /v1/chat/completions
//! - GET /v1/models
//!
//! plus the landing page at `/`. Everything else is a 404 envelope.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::middleware;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::model_catalog::ModelCatalog;
use crate::cache::response_cache::ResponseCache;
use crate::config::Config;
use crate::server::dashboard::landing_page;
use crate::server::error::{panic_response, ApiError};
use crate::server::gate::{gate, RequestContext};
use crate::server::shaper::{shape, Shaped};
use crate::server::streaming::into_sse;
use crate::upstream::client::Upstream;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: Arc<dyn Upstream>,
    pub catalog: ModelCatalog,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        upstream: Arc<dyn Upstream>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        let catalog = ModelCatalog::new(config.models.clone(), cache);
        Self {
            config,
            upstream,
            catalog,
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(landing_page).fallback(not_found))
        .route("/v1/models", get(list_models).fallback(not_found))
        .route(
            "/v1/chat/completions",
            post(chat_completions).fallback(not_found),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Chat completion request (OpenAI-compatible).
///
/// Only `model`, `messages` and `stream` are honoured; other OpenAI fields
/// are accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub stream: Option<bool>,
}

/// A conversation turn, forwarded upstream as-is.
///
/// `content` may be a string, an array of parts, or absent (forwarded as `null`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// A request that passed validation.
#[derive(Debug)]
pub struct ValidatedChat {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Parse a raw request body.
    ///
    /// Syntax errors and well-formed JSON of the wrong shape are reported
    /// with different messages.
    pub fn from_slice(body: &[u8]) -> Result<Self, ApiError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|_| ApiError::InvalidRequest("invalid JSON request body".to_string()))?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::InvalidRequest(format!("malformed chat completion request: {e}"))
        })
    }

    /// Require a non-empty `messages` and fill in the default model.
    pub fn validate(self, default_model: &str) -> Result<ValidatedChat, ApiError> {
        let messages = match self.messages {
            Some(messages) if !messages.is_empty() => messages,
            _ => {
                return Err(ApiError::InvalidRequest(
                    "request body is missing 'messages'".to_string(),
                ))
            }
        };
        let model = self
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model.to_string());
        Ok(ValidatedChat {
            model,
            messages,
            stream: self.stream.unwrap_or(false),
        })
    }
}

/// Chat completion response (non-streaming).
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: usize,
    pub message: ResponseMessage,
    pub finish_reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
}

/// Token accounting; the upstream reports none, so always zero.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Model listing response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body?;
    let chat = ChatCompletionRequest::from_slice(&body)?
        .validate(&state.config.models.default_model)?;

    info!(
        request_id = ctx.request_id,
        model = chat.model,
        messages = chat.messages.len(),
        stream = chat.stream,
        "Chat completion request"
    );

    let summary = state
        .upstream
        .summarize(&chat.messages, &ctx.request_id)
        .await?;

    match shape(summary, &ctx, chat.model, chat.stream, &state.config.stream) {
        Shaped::Complete(response) => Ok(Json(response).into_response()),
        Shaped::Stream(emitter) => {
            let stream = into_sse(emitter, state.config.stream.delay());
            Ok(Sse::new(stream)
                .keep_alive(KeepAlive::default())
                .into_response())
        }
    }
}

async fn list_models(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.catalog.respond(&method, &uri, &headers).await
}

async fn not_found(req: Request) -> ApiError {
    ApiError::NotFound {
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
    }
}
