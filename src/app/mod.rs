//! Application wiring: ties storage, upstream, server and lifecycle together.

pub mod app;
pub mod server;

pub use app::App;
pub use server::{Http, HttpServer};
