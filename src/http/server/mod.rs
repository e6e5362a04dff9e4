//! HTTP server surface exposed to the rest of the crate.

pub mod server;

pub use server::{HttpServer, Server};
