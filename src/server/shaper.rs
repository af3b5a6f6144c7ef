//! Reshapes an upstream summary into an OpenAI response.

use crate::config::StreamConfig;
use crate::server::gate::RequestContext;
use crate::server::openai_api::{ChatChoice, ChatCompletionResponse, ResponseMessage, Usage};
use crate::server::streaming::PseudoStream;

/// What the chat handler sends back.
#[derive(Debug)]
pub enum Shaped {
    Complete(ChatCompletionResponse),
    Stream(PseudoStream),
}

/// Current time in unix seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn shape(
    summary: String,
    ctx: &RequestContext,
    model: String,
    stream: bool,
    config: &StreamConfig,
) -> Shaped {
    if stream {
        Shaped::Stream(PseudoStream::new(
            ctx.completion_id(),
            model,
            summary,
            config.chunk_size,
        ))
    } else {
        Shaped::Complete(completion_response(summary, ctx, model))
    }
}

pub fn completion_response(
    summary: String,
    ctx: &RequestContext,
    model: String,
) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: ctx.completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model,
        choices: vec![ChatChoice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: summary,
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage::default(),
    }
}
