//! Upstream summarization service.
//!
//! - [`client`]: the `Upstream` trait and its reqwest-backed implementation

pub mod client;
