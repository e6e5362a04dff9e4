//! Integration tests for AdvCache.
//! 
//! This module contains end-to-end tests that verify cache behavior,
//! key isolation, whitelists, and other integration scenarios.

mod cases_cache_behavior_test;
mod cases_invalidation_test;
mod cases_order_and_negative_test;
mod cases_proxy_test;
mod cases_whitelist_test;
mod cases_workers_test;

pub mod support;
