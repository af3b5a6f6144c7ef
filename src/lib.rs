//! summary-gateway: OpenAI-compatible front for a summarization upstream.
//!
//! Each `/v1/chat/completions` call becomes one POST to a fixed upstream that
//! answers with a finished summary. The summary is returned either as a
//! `chat.completion` object or replayed as a paced SSE stream of
//! `chat.completion.chunk` frames.

pub mod cache;
pub mod config;
pub mod server;
pub mod upstream;
