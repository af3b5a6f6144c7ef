//! Edge-style response caching.
//!
//! - [`response_cache`]: request-keyed TTL store (`ResponseCache`, `MemoryResponseCache`)
//! - [`model_catalog`]: cached `/v1/models` responses

pub mod model_catalog;
pub mod response_cache;
