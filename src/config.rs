//! Enricher configuration
//!
//! ```json
//! {
//!     "key": "request.client_ip",
//!     "data_path": "/var/lib/geo/city.mmdb",
//!     "target": "geo",
//!     "key_as_prefix": true,
//!     "parallelism": 8
//! }
//! ```

use crate::error::{EnrichError, Result};
use crate::field_path::FieldPath;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration assembled by the embedding pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Dotted path of the field holding the IP address text
    pub key: String,
    /// MMDB file to open
    pub data_path: PathBuf,
    /// Dotted path under which attributes are written; siblings of the
    /// source field when absent
    pub target: Option<String>,
    /// Rename colliding keys to `<source key>_<attribute>` instead of
    /// overwriting them
    pub key_as_prefix: bool,
    /// Worker count; absent or 0 means available hardware parallelism
    pub parallelism: Option<usize>,
    /// Count addresses without a database entry as record failures
    pub miss_is_error: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            data_path: PathBuf::new(),
            target: None,
            key_as_prefix: true,
            parallelism: None,
            miss_is_error: true,
        }
    }
}

impl EnrichConfig {
    /// Config for a source key with defaults for everything else
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration object
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the source and target paths
    pub fn validate(&self) -> Result<()> {
        self.source_path()?;
        self.target_path()?;
        Ok(())
    }

    /// Parsed source path
    pub fn source_path(&self) -> Result<FieldPath> {
        if self.key.is_empty() {
            return Err(EnrichError::Config("key is required".to_string()));
        }
        FieldPath::parse(&self.key)
    }

    /// Keys under which attributes are written
    pub fn target_path(&self) -> Result<Vec<String>> {
        match &self.target {
            Some(target) => Ok(FieldPath::parse(target)?.segments().to_vec()),
            None => Ok(self.source_path()?.parent().to_vec()),
        }
    }

    /// Effective worker count, at least 1
    pub fn worker_count(&self) -> usize {
        match self.parallelism {
            Some(n) if n > 0 => n,
            _ => default_parallelism(),
        }
    }
}

/// Available hardware parallelism, at least 1
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}
