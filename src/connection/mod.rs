pub mod config;
pub mod factory;

pub use config::{ShardInstance, ShardInstancePatch};
pub use factory::{ClientFactory, FnClientFactory};
