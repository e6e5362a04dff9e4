//! Header filtering and sorting for cache key derivation.

pub mod filter;


pub use filter::filter_and_sort_request;
