// Package evictor provides eviction worker group functionality.

pub mod counters;
pub mod evictor;
pub mod telemetry;

// Re-export main types
pub use evictor::Evictor;
