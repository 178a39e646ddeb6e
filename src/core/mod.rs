pub mod error;
pub mod types;

pub use error::{BoxError, Result, ShardError};
pub use types::{ShardIndex, ShardKey, shard_index_from_f64};
