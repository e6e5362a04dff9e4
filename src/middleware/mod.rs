//! HTTP middleware chain applied around controllers.

pub mod middleware;
pub mod compression_middleware;
pub mod recover_middleware;

pub use middleware::Middleware;
