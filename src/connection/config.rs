use crate::core::{Result, ShardError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Physical shard instance
///
/// Binds an inclusive range of virtual shard indices to the connection
/// settings of one physical backend. Attributes this crate does not know
/// about are kept in `extra` and handed to the client factory untouched.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShardInstance {
    /// First virtual shard served by this instance (inclusive)
    pub virtual_start: i64,

    /// Last virtual shard served by this instance (inclusive)
    pub virtual_end: i64,

    /// Backend host
    #[serde(default = "default_host")]
    pub host: String,

    /// Backend port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    #[serde(default)]
    pub user: String,

    /// Password for authentication
    #[serde(default)]
    pub password: String,

    /// Opaque connection attributes passed through verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

impl ShardInstance {
    /// Create an instance serving virtual shards `start..=end`
    pub fn new(virtual_start: i64, virtual_end: i64) -> Self {
        Self {
            virtual_start,
            virtual_end,
            host: default_host(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Set the host
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username
    pub fn user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    /// Set the password
    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// Attach an opaque connection attribute
    pub fn attribute(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Returns true if `index` falls in `[virtual_start, virtual_end]`
    pub fn contains(&self, index: i64) -> bool {
        self.virtual_start <= index && index <= self.virtual_end
    }

    /// Number of virtual shards served by this instance
    pub fn len(&self) -> u64 {
        if self.virtual_end < self.virtual_start {
            return 0;
        }
        self.virtual_end.abs_diff(self.virtual_start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite connection attributes from a patch.
    ///
    /// The virtual range is never touched.
    pub fn apply_patch(&mut self, patch: &ShardInstancePatch) {
        if let Some(host) = &patch.host {
            self.host = host.clone();
        }
        if let Some(port) = patch.port {
            self.port = port;
        }
        if let Some(user) = &patch.user {
            self.user = user.clone();
        }
        if let Some(password) = &patch.password {
            self.password = password.clone();
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Connection string for diagnostics
    ///
    /// Format: "user:***@host:port[start..=end]"
    pub fn to_url(&self) -> String {
        format!(
            "{}:{}@{}:{}[{}..={}]",
            self.user,
            "***", // Don't expose password
            self.host,
            self.port,
            self.virtual_start,
            self.virtual_end
        )
    }

    /// Validate the instance
    pub fn validate(&self) -> Result<()> {
        if self.virtual_start < 0 {
            return Err(ShardError::Config(format!(
                "virtual-start must be >= 0, got {}",
                self.virtual_start
            )));
        }

        if self.virtual_end < self.virtual_start {
            return Err(ShardError::Config(format!(
                "virtual-end ({}) must not be below virtual-start ({})",
                self.virtual_end, self.virtual_start
            )));
        }

        if self.host.trim().is_empty() {
            return Err(ShardError::Config(format!(
                "host for virtual shards {}..={} must not be empty",
                self.virtual_start, self.virtual_end
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for ShardInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardInstance")
            .field("virtual_start", &self.virtual_start)
            .field("virtual_end", &self.virtual_end)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("extra", &self.extra)
            .finish()
    }
}

/// Partial connection settings used when repointing a physical instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShardInstancePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl ShardInstancePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn attribute(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.user.is_none()
            && self.password.is_none()
            && self.extra.is_empty()
    }
}
