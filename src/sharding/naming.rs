use crate::core::{Result, ShardError};

/// Minimum width of the numeric suffix in a derived name.
pub const SHARD_SUFFIX_WIDTH: usize = 4;

/// Builds the name a client is registered under: `{schema}_{index:04}`.
///
/// Indices wider than four digits are kept whole.
pub fn shard_name(index: i64, schema: &str) -> Result<String> {
    if index < 0 {
        return Err(ShardError::InvalidShardIndex(format!(
            "negative shard index ({}) is invalid",
            index
        )));
    }
    Ok(format!("{}_{:0width$}", schema, index, width = SHARD_SUFFIX_WIDTH))
}
