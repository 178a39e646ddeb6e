// ============================================================================
// shardmgr - virtual shard routing and per-shard client registry
// ============================================================================

pub mod core;
pub mod config;
pub mod connection;
pub mod facade;
pub mod logging;
pub mod sharding;

// Re-export main types for convenience
pub use core::{BoxError, Result, ShardError, ShardIndex, ShardKey, shard_index_from_f64};
pub use config::{Settings, ShardConfig, ShardingSettings};
pub use facade::ShardManager;
pub use logging::{LogFacade, NoopLogger, ShardLogger};

// Re-export connection settings and client construction
pub use connection::{ClientFactory, FnClientFactory, ShardInstance, ShardInstancePatch};

// Re-export routing building blocks
pub use sharding::{
    ClientRegistry, Fnv1aHasher, Murmur3Hasher, ShardHasher, ShardResolver, UpdatePolicy,
    VirtualShardMap, for_all_shards, for_all_shards_with, shard_name, spawn_for_all_shards,
};
