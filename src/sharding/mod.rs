pub mod fanout;
pub mod hash;
pub mod naming;
pub mod registry;
pub mod resolver;
pub mod shard_map;

pub use fanout::{for_all_shards, for_all_shards_with, spawn_for_all_shards};
pub use hash::{Fnv1aHasher, Murmur3Hasher, ShardHasher, murmur3_32};
pub use naming::{SHARD_SUFFIX_WIDTH, shard_name};
pub use registry::{ClientRegistry, UpdatePolicy};
pub use resolver::ShardResolver;
pub use shard_map::VirtualShardMap;
