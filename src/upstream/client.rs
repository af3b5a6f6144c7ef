//! Client for the fixed upstream summarization endpoint.
//!
//! Every chat completion turns into exactly one POST of
//! `{ website, messages }`; the reply is expected to be `{ summary: string }`.
//! There is no retry and no timeout beyond reqwest's defaults.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::UpstreamConfig;
use crate::server::openai_api::ChatMessage;

/// Site identifier the upstream expects in every payload.
pub const UPSTREAM_WEBSITE: &str = "ask-ai-questions";

#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status.
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not valid JSON.
    #[error("unable to parse upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Valid JSON, but `summary` is missing or not a string.
    #[error("upstream response is missing a string 'summary' field")]
    MissingSummary,

    /// The request never produced a readable response.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Request body sent upstream.
#[derive(Debug, Serialize)]
pub struct UpstreamPayload<'a> {
    pub website: &'static str,
    pub messages: &'a [ChatMessage],
}

impl<'a> UpstreamPayload<'a> {
    pub fn new(messages: &'a [ChatMessage]) -> Self {
        Self {
            website: UPSTREAM_WEBSITE,
            messages,
        }
    }
}

/// A source of summaries for a conversation.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Issue one call for `messages` and return the summary text.
    async fn summarize(
        &self,
        messages: &[ChatMessage],
        request_id: &str,
    ) -> Result<String, UpstreamError>;
}

/// Extract the summary from a raw upstream body.
pub fn parse_summary(body: &str) -> Result<String, UpstreamError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    match value.get("summary") {
        Some(serde_json::Value::String(summary)) => Ok(summary.clone()),
        _ => Err(UpstreamError::MissingSummary),
    }
}

/// HTTP implementation of [`Upstream`].
pub struct HttpUpstream {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpUpstream {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn summarize(
        &self,
        messages: &[ChatMessage],
        request_id: &str,
    ) -> Result<String, UpstreamError> {
        let payload = UpstreamPayload::new(messages);

        let response = self
            .client
            .post(&self.config.url)
            .header(ACCEPT, "*/*")
            .header(ACCEPT_LANGUAGE, &self.config.accept_language)
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, &self.config.origin)
            .header(REFERER, &self.config.referer)
            .header(USER_AGENT, &self.config.user_agent)
            .header("X-Request-ID", request_id)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(request_id, status = status.as_u16(), body = %text, "Upstream error");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(request_id, bytes = text.len(), "Upstream response received");
        parse_summary(&text)
    }
}
