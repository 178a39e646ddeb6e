//! Virtual shard map - mapping of virtual shard ranges to physical instances.
//!
//! Many virtual shards usually share one physical host, so the map holds a
//! handful of contiguous ranges. Lookups go through a B-tree keyed by range
//! start instead of scanning the instance list.

use crate::connection::{ShardInstance, ShardInstancePatch};
use crate::core::{Result, ShardError};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct VirtualShardMap {
    /// Instances in configured order.
    instances: Vec<ShardInstance>,
    /// Range start -> position in `instances`.
    starts: BTreeMap<i64, usize>,
}

impl VirtualShardMap {
    /// Builds the map, rejecting invalid and overlapping ranges.
    ///
    /// Gaps are allowed here; a virtual index nobody serves fails at lookup.
    pub fn new(instances: Vec<ShardInstance>) -> Result<Self> {
        let mut starts = BTreeMap::new();

        for (position, instance) in instances.iter().enumerate() {
            instance.validate()?;

            if let Some((_, &previous)) = starts.range(..=instance.virtual_end).next_back() {
                let other: &ShardInstance = &instances[previous];
                if other.virtual_end >= instance.virtual_start {
                    return Err(overlap(other, instance));
                }
            }
            if let Some((_, &next)) = starts.range(instance.virtual_start..).next() {
                let other: &ShardInstance = &instances[next];
                if other.virtual_start <= instance.virtual_end {
                    return Err(overlap(other, instance));
                }
            }

            starts.insert(instance.virtual_start, position);
        }

        Ok(Self { instances, starts })
    }

    /// Returns the instance serving `index`.
    pub fn settings_for(&self, index: i64) -> Result<&ShardInstance> {
        self.position_of(index)
            .map(|position| &self.instances[position])
            .ok_or(ShardError::ShardNotFound { shard: index })
    }

    /// Position of the instance serving `index` in configured order.
    pub fn position_of(&self, index: i64) -> Option<usize> {
        // Find the entry with the largest start <= index.
        self.starts
            .range(..=index)
            .next_back()
            .map(|(_, &position)| position)
            .filter(|&position| self.instances[position].contains(index))
    }

    /// Repoints the instance at `position` and returns the updated settings.
    pub fn patch(&mut self, position: usize, patch: &ShardInstancePatch) -> Result<&ShardInstance> {
        let instance = self.instances.get_mut(position).ok_or_else(|| {
            ShardError::Config(format!("no shard instance at position {}", position))
        })?;

        let mut patched = instance.clone();
        patched.apply_patch(patch);
        patched.validate()?;
        *instance = patched;

        Ok(&*instance)
    }

    pub fn instances(&self) -> &[ShardInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn overlap(existing: &ShardInstance, incoming: &ShardInstance) -> ShardError {
    ShardError::Config(format!(
        "virtual shards {}..={} overlap {}..={}",
        incoming.virtual_start, incoming.virtual_end, existing.virtual_start, existing.virtual_end
    ))
}
