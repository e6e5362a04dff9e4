//! Service orchestration and worker lifecycle management.

pub mod api;
pub mod governor;
pub mod service;
pub mod transport;

pub use api::Governor;
pub use governor::Orchestrator;
pub use service::{Config, Freq, Service};
pub use transport::Transport;
