//! LRU tracking strategy selected by configuration.
//

/// Selects how the sharded map tracks recency for eviction victim selection.
///
/// This is a plain config value rather than a trait object: the eviction and
/// victim-selection code branches on it directly (see `eviction.rs`), which
/// keeps the hot path free of dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LRUMode {
    /// Maintain a real doubly-linked LRU list per shard plus a global
    /// memory-ordered balancer list; victim selection is exact.
    Listing,
    /// Track no list; victim selection samples a handful of shards/keys.
    Sampling,
}
