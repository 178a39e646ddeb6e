//! Shard manager configuration.
//!
//! The on-disk layout is JSON:
//!
//! ```json
//! {
//!   "logLevel": "debug",
//!   "sharding": {
//!     "prefix": ["orders"],
//!     "shard-count": 4,
//!     "shard-map": [
//!       { "virtual-start": 0, "virtual-end": 2, "host": "db1", "port": 3306 },
//!       { "virtual-start": 3, "virtual-end": 3, "host": "db2", "port": 3306 }
//!     ]
//!   }
//! }
//! ```

use crate::connection::{ClientFactory, FnClientFactory, ShardInstance};
use crate::core::{Result, ShardError};
use crate::sharding::{Murmur3Hasher, ShardHasher, UpdatePolicy};
use log::LevelFilter;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Top-level settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    pub sharding: ShardingSettings,
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Parsed `logLevel`, `None` when unset.
    pub fn log_filter(&self) -> Result<Option<LevelFilter>> {
        self.log_level
            .as_deref()
            .map(|level| {
                level.parse::<LevelFilter>().map_err(|_| {
                    ShardError::Config(format!("unknown logLevel '{}'", level))
                })
            })
            .transpose()
    }

    pub fn validate(&self) -> Result<()> {
        self.log_filter()?;
        self.sharding.validate()
    }
}

/// Sharding layout: schema prefixes, virtual shard count and shard map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShardingSettings {
    /// Schema prefixes; accepts a single string or a list
    #[serde(deserialize_with = "one_or_many")]
    pub prefix: Vec<String>,
    pub shard_count: u32,
    pub shard_map: Vec<ShardInstance>,
}

impl ShardingSettings {
    pub fn new(prefix: Vec<String>, shard_count: u32, shard_map: Vec<ShardInstance>) -> Self {
        Self {
            prefix,
            shard_count,
            shard_map,
        }
    }

    /// Checks the settings that can be checked without building clients.
    ///
    /// Coverage of every virtual shard is not checked here; a gap surfaces
    /// as `ShardNotFound` while the registry is built.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(ShardError::Config("shard-count must be >= 1".to_string()));
        }

        if self.prefix.is_empty() {
            return Err(ShardError::Config(
                "at least one schema prefix is required".to_string(),
            ));
        }

        if let Some(empty) = self.prefix.iter().position(|p| p.trim().is_empty()) {
            return Err(ShardError::Config(format!(
                "schema prefix #{} must not be empty",
                empty
            )));
        }

        for instance in &self.shard_map {
            instance.validate()?;
        }

        Ok(())
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(prefix) => vec![prefix],
        OneOrMany::Many(prefixes) => prefixes,
    })
}

/// Everything the shard manager needs at construction
pub struct ShardConfig<C> {
    pub sharding: ShardingSettings,
    pub hasher: Arc<dyn ShardHasher>,
    pub factory: Arc<dyn ClientFactory<C>>,
    pub update_policy: UpdatePolicy,
}

impl<C> ShardConfig<C> {
    /// Uses MurmurHash3 for text keys and single-entry updates.
    pub fn new(sharding: ShardingSettings, factory: Arc<dyn ClientFactory<C>>) -> Self {
        Self {
            sharding,
            hasher: Arc::new(Murmur3Hasher),
            factory,
            update_policy: UpdatePolicy::default(),
        }
    }

    /// Builds a config from a synchronous factory closure
    pub fn with_fn<F>(sharding: ShardingSettings, create: F) -> Self
    where
        C: Send + 'static,
        F: Fn(&str, &ShardInstance) -> anyhow::Result<C> + Send + Sync + 'static,
    {
        Self::new(sharding, Arc::new(FnClientFactory::new(create)))
    }

    /// Set the hash strategy for text keys
    pub fn hasher(mut self, hasher: impl ShardHasher + 'static) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    /// Set the update policy
    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }
}
