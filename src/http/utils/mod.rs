//! Small HTTP header helpers shared across the server and controllers.

pub mod last_updated_at;

pub use last_updated_at::{set_last_updated_at_value, LAST_UPDATED_AT_KEY};
