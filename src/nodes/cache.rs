//! Node-local cache side-table
//!
//! Entries are keyed by the owning node's instance id so they survive renames
//! and are never shared by duplicates. A composite node stores the subgraph it
//! captured at link time here: the interior update list plus its two boundary
//! nodes. Only the owning node's own `link`, `unlink`, `update` and `process`
//! hooks write its entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Subgraph captured by a composite node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSubgraph {
    /// Inputs boundary pseudo-node
    pub inputs: NodeId,
    /// Outputs boundary pseudo-node
    pub outputs: NodeId,
    /// Interior nodes in execution order, boundaries excluded
    pub update_list: Vec<NodeId>,
}

impl CachedSubgraph {
    /// Whether `node` is a boundary or an interior node of this subgraph
    pub fn contains(&self, node: NodeId) -> bool {
        node == self.inputs || node == self.outputs || self.update_list.contains(&node)
    }
}

/// Pattern for matching cache entries during invalidation
#[derive(Debug, Clone)]
pub enum CacheKeyPattern {
    /// The entry owned by a specific node
    Owner(NodeId),
    /// Every entry whose captured subgraph contains a node
    Member(NodeId),
}

impl CacheKeyPattern {
    /// Check if this pattern matches a given entry
    pub fn matches(&self, owner: NodeId, entry: &CachedSubgraph) -> bool {
        match self {
            CacheKeyPattern::Owner(id) => owner == *id,
            CacheKeyPattern::Member(id) => entry.contains(*id),
        }
    }
}

/// Statistics about cache usage
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    /// Current number of entries
    pub total_entries: usize,
    /// Lookups that found an entry
    pub cache_hits: usize,
    /// Lookups that found nothing
    pub cache_misses: usize,
    /// Entries removed by invalidation or eviction
    pub cache_invalidations: usize,
}

impl CacheStatistics {
    /// Calculate cache hit ratio
    pub fn hit_ratio(&self) -> f32 {
        let total_accesses = self.cache_hits + self.cache_misses;
        if total_accesses == 0 {
            0.0
        } else {
            self.cache_hits as f32 / total_accesses as f32
        }
    }
}

/// Per-node cache held by a graph
#[derive(Debug, Default)]
pub struct NodeCache {
    entries: HashMap<NodeId, CachedSubgraph>,
    stats: CacheStatistics,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the entry owned by `owner`
    pub fn insert(&mut self, owner: NodeId, entry: CachedSubgraph) {
        self.entries.insert(owner, entry);
        self.stats.total_entries = self.entries.len();
    }

    /// Look up an entry, counting the hit or miss
    pub fn get(&mut self, owner: NodeId) -> Option<&CachedSubgraph> {
        match self.entries.get(&owner) {
            Some(entry) => {
                self.stats.cache_hits += 1;
                Some(entry)
            }
            None => {
                self.stats.cache_misses += 1;
                None
            }
        }
    }

    /// Look up an entry without touching the statistics
    pub fn peek(&self, owner: NodeId) -> Option<&CachedSubgraph> {
        self.entries.get(&owner)
    }

    pub fn contains(&self, owner: NodeId) -> bool {
        self.entries.contains_key(&owner)
    }

    /// The composite whose captured subgraph includes `node`, if any
    pub fn owner_of(&self, node: NodeId) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|(owner, entry)| **owner != node && entry.contains(node))
            .map(|(owner, _)| *owner)
    }

    /// Remove the entry owned by `owner`
    pub fn evict(&mut self, owner: NodeId) -> bool {
        let removed = self.entries.remove(&owner).is_some();
        if removed {
            self.stats.cache_invalidations += 1;
            self.stats.total_entries = self.entries.len();
        }
        removed
    }

    /// Remove every entry matching the pattern, returning how many went
    pub fn invalidate(&mut self, pattern: &CacheKeyPattern) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|owner, entry| !pattern.matches(*owner, entry));
        let removed = before - self.entries.len();
        self.stats.cache_invalidations += removed;
        self.stats.total_entries = self.entries.len();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> &CacheStatistics {
        &self.stats
    }
}
