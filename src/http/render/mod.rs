//! Response rendering: writing cached/upstream payloads back onto the wire.

pub mod renderer;
pub mod templates;

pub use renderer::{write_from_entry, write_from_raw_response, write_from_response};
pub use templates::{INTERNAL_SERVER_ERROR_RESPONSE_BODY, UNAVAILABLE_RESPONSE_BODY};
