//! Cached `/v1/models` responses.
//!
//! The model list is a pure function of configuration. A miss builds it,
//! answers immediately and stores a copy in the background; a hit replays the
//! stored body. Both are tagged with `x-cache-status`.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::response_cache::{CacheKey, CachedResponse, ResponseCache};
use crate::config::ModelsConfig;
use crate::server::error::ApiError;
use crate::server::openai_api::{ModelInfo, ModelList};
use crate::server::shaper::unix_now;

/// Header reporting whether a response came from the cache.
pub static CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Serves the model list through a [`ResponseCache`].
#[derive(Clone)]
pub struct ModelCatalog {
    models: ModelsConfig,
    cache: Arc<dyn ResponseCache>,
}

impl ModelCatalog {
    pub fn new(models: ModelsConfig, cache: Arc<dyn ResponseCache>) -> Self {
        Self { models, cache }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.models.cache_ttl_secs)
    }

    /// Build the model list from configuration.
    pub fn model_list(&self) -> ModelList {
        let created = unix_now();
        ModelList {
            object: "list".to_string(),
            data: self
                .models
                .known_models
                .iter()
                .map(|name| ModelInfo {
                    id: name.clone(),
                    object: "model".to_string(),
                    created,
                    owned_by: self.models.owned_by.clone(),
                })
                .collect(),
        }
    }

    /// Answer one `/v1/models` request.
    pub async fn respond(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Response, ApiError> {
        let key = CacheKey::from_request(method, uri, headers);

        if let Some(cached) = self.cache.lookup(&key).await {
            debug!("Model list served from cache");
            return Ok(render(cached, CacheStatus::Hit));
        }

        let body = serde_json::to_vec(&self.model_list())
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let cached = CachedResponse {
            content_type: "application/json".to_string(),
            cache_control: format!("public, max-age={}", self.models.cache_ttl_secs),
            body: Bytes::from(body),
        };

        let cache = self.cache.clone();
        let ttl = self.ttl();
        let stored = cached.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.store(key, stored, ttl).await {
                warn!(error = %e, "Failed to cache model list");
            }
        });

        Ok(render(cached, CacheStatus::Miss))
    }
}

fn render(cached: CachedResponse, status: CacheStatus) -> Response {
    let mut response = (StatusCode::OK, cached.body).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&cached.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&cached.cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    headers.insert(
        CACHE_STATUS_HEADER.clone(),
        HeaderValue::from_static(status.as_str()),
    );
    response
}
