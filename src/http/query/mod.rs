//! Query filtering and sorting for cache key derivation.

pub mod filter;

#[cfg(test)]
mod filter_test;

pub use filter::filter_and_sort_request;
