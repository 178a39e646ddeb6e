pub mod shard_manager;

pub use shard_manager::ShardManager;
