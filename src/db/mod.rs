//! Cache storage functionality and database implementation.

pub mod admission;
pub mod storage;
pub mod db;
pub mod log;
pub mod persistance;

// Re-export main types
pub use db::{Storage, DB, SVC_EVICTOR, SVC_LIFETIME_MANAGER};
// Storage struct is available via db::storage::Storage
