//! HTTP server providing an OpenAI-compatible API.
//!
//! - [`openai_api`]: Request/response types, route handlers and the router
//! - [`gate`]: Correlation ids and the bearer-token check
//! - [`shaper`]: Summary to completion/stream conversion
//! - [`streaming`]: SSE pseudo-streaming
//! - [`error`]: The uniform error envelope
//! - [`dashboard`]: Landing page

pub mod dashboard;
pub mod error;
pub mod gate;
pub mod openai_api;
pub mod shaper;
pub mod streaming;
