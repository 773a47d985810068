pub mod catalog;
pub mod config;
pub mod errors;
pub mod graph;
pub mod memory;
pub mod models;
pub mod sqlite;
pub mod utils;

use crate::catalog::Catalog;
use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{Result, StorageError};
use crate::graph::GraphStore;
use crate::memory::MemoryGraph;
use crate::sqlite::SqliteGraph;
use crate::utils::id::TaggedIdPolicy;
use std::sync::Arc;

pub use crate::graph::{EdgeRecord, PropertyLimits, PropertyValue};
pub use crate::utils::id::{IdKind, IdPolicy};

/// The main entry point for the `gstorage` library.
///
/// `GStorage` bundles the graph the loader writes into with the optional
/// run catalog:
/// - A transactional graph (`GraphStore`), either in memory or in SQLite.
/// - A metadata database (`Catalog`) using SQLite to track load and download runs,
///   present whenever a storage directory is configured.
///
/// # Example
///
/// ```rust,no_run
/// use gstorage::{GStorage, config::StorageConfig};
/// use tempfile::tempdir;
///
/// let dir = tempdir().unwrap();
/// let storage = GStorage::open(StorageConfig::new(dir.path())).unwrap();
/// assert!(storage.catalog.is_some());
/// ```
pub struct GStorage {
    pub config: StorageConfig,
    pub catalog: Option<Arc<Catalog>>,
    pub graph: Box<dyn GraphStore>,
}

impl GStorage {
    /// Opens the configured backend.
    ///
    /// This will:
    /// 1. Create the storage directory when one is configured.
    /// 2. Open the catalog and initialize its schema.
    /// 3. Open (or create) the graph.
    pub fn open(config: StorageConfig) -> Result<Self> {
        if let Some(dir) = &config.directory {
            std::fs::create_dir_all(dir)?;
        }

        let catalog = match config.catalog_path() {
            Some(path) => {
                let catalog = Catalog::open(&path)?;
                catalog.initialize_schema()?;
                Some(Arc::new(catalog))
            }
            None => None,
        };

        let graph: Box<dyn GraphStore> = match config.backend {
            StorageBackend::Memory => Box::new(MemoryGraph::with_policy(
                Arc::new(TaggedIdPolicy::default()),
                config.limits,
            )),
            StorageBackend::Sqlite => {
                let path = config.graph_path().ok_or_else(|| {
                    StorageError::Config("sqlite backend requires storage.directory".to_string())
                })?;
                let conn = rusqlite::Connection::open(&path)?;
                Box::new(SqliteGraph::from_connection(
                    conn,
                    Arc::new(TaggedIdPolicy::default()),
                    config.limits,
                )?)
            }
        };

        log::info!(
            "opened {:?} graph{}",
            config.backend,
            config
                .directory
                .as_ref()
                .map(|d| format!(" in {}", d.display()))
                .unwrap_or_default()
        );

        Ok(Self {
            config,
            catalog,
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_gstorage_initialization() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path());

        let storage = GStorage::open(config.clone());
        assert!(storage.is_ok());

        assert!(config.graph_path().unwrap().exists());
        assert!(config.catalog_path().unwrap().exists());
    }

    #[test]
    fn in_memory_storage_has_no_catalog() {
        let mut storage = GStorage::open(StorageConfig::in_memory()).unwrap();
        assert!(storage.catalog.is_none());
        assert_eq!(storage.graph.vertex_count().unwrap(), 0);
    }
}
