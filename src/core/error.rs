use thiserror::Error;

/// Boxed error carried by failures that originate outside this crate
/// (client factories, fan-out operations).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid shard index: {0}")]
    InvalidShardIndex(String),

    #[error("No shard found for virtual index {shard}")]
    ShardNotFound { shard: i64 },

    /// `known` lists every registered client name at the time of the lookup.
    /// It is diagnostic context and not part of the message.
    #[error("Client '{name}' not found")]
    ClientNotFound { name: String, known: Vec<String> },

    #[error("Failed to create client '{name}': {source}")]
    ClientCreationFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Operation failed on shard {shard} ({count} shards failed): {source}", count = .failed_shards.len())]
    FanOutFailure {
        shard: u32,
        failed_shards: Vec<u32>,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, ShardError>;

impl<T> From<std::sync::PoisonError<T>> for ShardError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<std::io::Error> for ShardError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_not_found_message_omits_known_names() {
        let err = ShardError::ClientNotFound {
            name: "orders_0007".to_string(),
            known: vec!["orders_0000".to_string(), "orders_0001".to_string()],
        };

        let message = err.to_string();
        assert_eq!(message, "Client 'orders_0007' not found");
        assert!(!message.contains("orders_0000"));
    }

    #[test]
    fn test_fan_out_failure_exposes_source() {
        let err = ShardError::FanOutFailure {
            shard: 1,
            failed_shards: vec![1, 3],
            source: "boom".into(),
        };

        assert!(err.to_string().contains("2 shards failed"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "boom");
    }

    #[test]
    fn test_poisoned_lock_maps_to_lock_error() {
        let lock = std::sync::Mutex::new(0);
        let _ = std::panic::catch_unwind(|| {
            let _guard = lock.lock().unwrap();
            panic!("poison");
        });

        let err: ShardError = lock.lock().unwrap_err().into();
        assert!(matches!(err, ShardError::Lock(_)));
    }
}
