// Package model provides cache entry models and related functionality.

pub mod entry;
pub mod timestamps;
pub mod keys;
pub mod header;
pub mod query;
pub mod payload;
pub mod payload_encoder;
pub mod payload_decoder;
pub mod dump;
pub mod refresh;
pub mod rule;
pub mod to_bytes;


// Re-export main types
pub use entry::{Entry, Response, Payload, RequestPayload, ResponsePayload};
pub use rule::{match_cache_rule, is_cache_rule_not_found_err};
