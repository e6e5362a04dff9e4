//! Snapshot dump/load functionality for the cache storage.

pub mod dumper;

pub use dumper::{DumpNotEnabledError, Dumper, DumperImpl};
