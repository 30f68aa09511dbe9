//! Job store persistence configuration.

use serde::{Deserialize, Serialize};

/// Job store persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Store backend: `in_memory` or `postgres`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// PostgreSQL connection URL (required for the `postgres` backend).
    #[serde(default)]
    pub url: String,
    /// Connection pool size for the `postgres` backend.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

impl PersistenceConfig {
    /// Whether the configured backend is PostgreSQL.
    #[must_use]
    pub fn is_postgres(&self) -> bool {
        self.backend == "postgres"
    }
}

pub(crate) fn default_backend() -> String {
    "in_memory".to_string()
}

pub(crate) const fn default_max_connections() -> u32 {
    5
}
