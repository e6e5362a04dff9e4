//! Upstream HTTP client construction.

pub mod hyper_client;

pub use hyper_client::{create_client, HyperClient};
