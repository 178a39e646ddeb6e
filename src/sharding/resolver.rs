use super::hash::ShardHasher;
use crate::core::{ShardIndex, ShardKey};
use rand::Rng;
use std::sync::Arc;

/// Maps routing keys to virtual shard indices.
///
/// The mapping depends only on the key, the shard count and the hash
/// strategy, so it is stable for the lifetime of the resolver.
#[derive(Clone)]
pub struct ShardResolver {
    shard_count: u32,
    hasher: Arc<dyn ShardHasher>,
}

impl ShardResolver {
    /// `shard_count` must be positive; the manager validates this before
    /// building a resolver.
    pub fn new(shard_count: u32, hasher: Arc<dyn ShardHasher>) -> Self {
        Self {
            shard_count: shard_count.max(1),
            hasher,
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    pub fn resolve(&self, key: &ShardKey) -> ShardIndex {
        match key {
            ShardKey::Integer(value) => self.resolve_integer(*value),
            ShardKey::Text(value) => self.resolve_text(value),
        }
    }

    pub fn resolve_integer(&self, key: i64) -> ShardIndex {
        // unsigned_abs keeps i64::MIN in range
        (key.unsigned_abs() % u64::from(self.shard_count)) as ShardIndex
    }

    pub fn resolve_text(&self, key: &str) -> ShardIndex {
        let hash = self.hasher.hash(key, self.shard_count);
        hash.rem_euclid(i64::from(self.shard_count)) as ShardIndex
    }

    /// Uniformly random shard index.
    pub fn pick_random(&self) -> ShardIndex {
        rand::thread_rng().gen_range(0..self.shard_count)
    }
}

impl std::fmt::Debug for ShardResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardResolver")
            .field("shard_count", &self.shard_count)
            .finish_non_exhaustive()
    }
}
