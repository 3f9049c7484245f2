use serde::{Deserialize, Serialize};

/// Default amount of cached nodes above which `sync` always empties the cache.
pub const DEFAULT_CACHE_FLUSH_THRESHOLD: usize = 20;

/// Construction time settings of a [`Trie`](crate::Trie).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrieConfig {
    /// Mark superseded nodes for deletion from the store on the next commit.
    ///
    /// Nodes are not reference counted: a node is dropped as soon as one of its
    /// parents stops pointing at it. This is only sound when no two parents
    /// share an identical subtree, which holds in practice when keys are hashes
    /// (see [`SecureTrie`](crate::SecureTrie)).
    pub pruning_enabled: bool,
    /// Cache size above which `sync` flushes the whole cache even when dirty
    pub cache_flush_threshold: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            pruning_enabled: false,
            cache_flush_threshold: DEFAULT_CACHE_FLUSH_THRESHOLD,
        }
    }
}

impl TrieConfig {
    pub const fn with_pruning(mut self, enabled: bool) -> Self {
        self.pruning_enabled = enabled;
        self
    }

    pub const fn with_cache_flush_threshold(mut self, threshold: usize) -> Self {
        self.cache_flush_threshold = threshold;
        self
    }
}
