//! Persisted key-value configuration.
//!
//! The config file is a flat JSON object of string values. It is created on
//! the first write and merged on every later write; stagely never deletes it.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default config file name, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "stagely.config";

/// Key holding the AWS cli profile name
pub const AWS_PROFILE: &str = "awsProfile";

/// Key holding the full cluster name (`{name}.{hostedZone}`)
pub const CLUSTER_NAME: &str = "clusterName";

/// Key holding the kops state-store bucket name (`{name}-state-store`)
pub const CLUSTER_STATE_STORE: &str = "clusterStateStore";

/// In-memory copy of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigRecord {
    entries: BTreeMap<String, String>,
}

impl ConfigRecord {
    /// Value for `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value for `key`, or `KeyMissing`
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            ConfigError::KeyMissing {
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Set `key` to `value`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads and writes the config file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store for the config file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the config file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the config file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the config file, `None` when it does not exist
    pub fn load(&self) -> Result<Option<ConfigRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record = serde_json::from_str(&contents).map_err(|e| ConfigError::Corrupted {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Some(record))
    }

    /// Load the config file, failing with `Missing` when it does not exist
    pub fn require(&self) -> Result<ConfigRecord> {
        self.load()?.ok_or_else(|| {
            ConfigError::Missing {
                path: self.path.clone(),
            }
            .into()
        })
    }

    /// Set one key and persist, keeping every other key already on disk
    pub fn write(&self, key: &str, value: &str) -> Result<ConfigRecord> {
        let mut record = self.load()?.unwrap_or_default();
        record.set(key, value);
        self.save(&record)?;
        log::debug!("Saved {} to {}", key, self.path.display());
        Ok(record)
    }

    /// Write the whole record through a temp file and rename
    fn save(&self, record: &ConfigRecord) -> Result<()> {
        let serialized = serde_json::to_string(record)?;
        let temp_path = self.path.with_extension("tmp");

        let save_failed = |e: std::io::Error| ConfigError::SaveFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        {
            let mut file = fs::File::create(&temp_path).map_err(save_failed)?;
            file.write_all(serialized.as_bytes()).map_err(save_failed)?;
            file.sync_all().map_err(save_failed)?;
        }

        fs::rename(&temp_path, &self.path).map_err(save_failed)?;
        Ok(())
    }
}
