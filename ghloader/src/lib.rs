//! Ingests hourly GitHub archive dumps into a labeled graph.

pub mod checkpoint;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod identity;
pub mod loader;
pub mod mapper;
pub mod models;
pub mod params;
pub mod schema;
pub mod timestamp;

pub use checkpoint::{Checkpoint, CheckpointStore, PropertiesCheckpointStore};
pub use error::{LoaderError, Result};
pub use fetch::{ArchiveDownloader, ArchiveSource, DownloadReport, Fetched, HttpArchiveSource};
pub use handler::EventHandler;
pub use loader::{LoadOutcome, LoadReport, Loader};
pub use params::{HandlerOptions, LoaderOptions};
pub use timestamp::ArchiveHour;
