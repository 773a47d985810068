use crate::errors::{Result, StorageError};
use crate::graph::PropertyLimits;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const BACKEND_KEY: &str = "storage.backend";
pub const DIRECTORY_KEY: &str = "storage.directory";
pub const MAX_STRING_LEN_KEY: &str = "storage.maxStringLength";

const DEFAULT_DIRECTORY: &str = "/tmp/github";

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub limits: PropertyLimits,
}

impl StorageConfig {
    /// A SQLite-backed configuration rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            directory: Some(base_path.into()),
            limits: PropertyLimits::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            directory: None,
            limits: PropertyLimits::default(),
        }
    }

    /// Reads the `storage.*` keys of a loader state file.
    pub fn from_properties(props: &BTreeMap<String, String>) -> Result<Self> {
        let mut config = match props.get(BACKEND_KEY).map(|s| s.trim()) {
            None | Some("") => {
                log::warn!("no storage backend specified; using an in-memory graph");
                Self::in_memory()
            }
            Some("memory") => Self::in_memory(),
            Some("sqlite") => {
                let dir = props
                    .get(DIRECTORY_KEY)
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(DEFAULT_DIRECTORY);
                Self::new(dir)
            }
            Some(other) => {
                return Err(StorageError::Config(format!(
                    "unsupported storage backend: {other}"
                )))
            }
        };

        if config.backend == StorageBackend::Memory {
            config.directory = props
                .get(DIRECTORY_KEY)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from);
        }

        if let Some(raw) = props.get(MAX_STRING_LEN_KEY) {
            config.limits.max_string_len = raw.trim().parse().map_err(|_| {
                StorageError::Config(format!("{MAX_STRING_LEN_KEY} must be a number, got '{raw}'"))
            })?;
        }

        Ok(config)
    }

    pub fn graph_path(&self) -> Option<PathBuf> {
        match self.backend {
            StorageBackend::Sqlite => self.directory.as_ref().map(|d| d.join("graph.sqlite")),
            StorageBackend::Memory => None,
        }
    }

    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|d| d.join("catalog.sqlite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_backend_defaults_to_memory() {
        let config = StorageConfig::from_properties(&props(&[])).unwrap();
        assert_eq!(config.backend, StorageBackend::Memory);
        assert!(config.graph_path().is_none());
        assert!(config.catalog_path().is_none());
    }

    #[test]
    fn sqlite_backend_uses_directory() {
        let config = StorageConfig::from_properties(&props(&[
            ("storage.backend", "sqlite"),
            ("storage.directory", "/data/gh"),
            ("storage.maxStringLength", "128"),
        ]))
        .unwrap();
        assert_eq!(config.backend, StorageBackend::Sqlite);
        assert_eq!(config.graph_path(), Some(PathBuf::from("/data/gh/graph.sqlite")));
        assert_eq!(config.catalog_path(), Some(PathBuf::from("/data/gh/catalog.sqlite")));
        assert_eq!(config.limits.max_string_len, 128);
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let err = StorageConfig::from_properties(&props(&[("storage.backend", "hbase")]))
            .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
