use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flate2::read::MultiGzDecoder;
use gstorage::graph::GraphStore;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{LoaderError, Result};
use crate::handler::EventHandler;
use crate::models::Event;
use crate::params::LoaderOptions;
use crate::timestamp::ArchiveHour;

const COMPRESSED_SUFFIX: &str = ".gz";
const JSON_SUFFIXES: [&str; 2] = [".json", ".ldjson"];

/// Counters for one loading run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Non-blank lines assembled into the graph.
    pub lines: u64,
    pub files_loaded: u64,
    /// Files at or before the checkpoint, or not placeable against it.
    pub files_skipped: u64,
    /// Files that are not line-delimited JSON archives.
    pub files_ignored: u64,
    pub elapsed: Duration,
}

/// The advanced checkpoint together with what the run did.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub checkpoint: Checkpoint,
    pub report: LoadReport,
}

/// Orders directory entries by the archive hour in their names. Entries
/// without one sort first, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFileKey {
    hour: Option<ArchiveHour>,
    name: String,
}

impl ArchiveFileKey {
    pub fn for_path(path: &Path) -> Self {
        Self {
            hour: ArchiveHour::from_path(path).ok(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub fn hour(&self) -> Option<ArchiveHour> {
        self.hour
    }
}

impl Ord for ArchiveFileKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hour
            .cmp(&other.hour)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for ArchiveFileKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether the name, minus a `.gz` suffix, ends in `.json` or `.ldjson`.
pub fn is_json_archive(name: &str) -> bool {
    let name = name.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(name);
    JSON_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn open_lines(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let compressed = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(COMPRESSED_SUFFIX));
    if compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

struct Run {
    root: PathBuf,
    checkpoint: Checkpoint,
    last: Option<ArchiveHour>,
    report: LoadReport,
}

/// Walks archive files in hour order, feeding each line to the handler and
/// advancing the checkpoint after every completed file.
pub struct Loader {
    handler: EventHandler,
    checkpoints: Arc<dyn CheckpointStore>,
    options: LoaderOptions,
}

impl Loader {
    pub fn new(
        handler: EventHandler,
        checkpoints: Arc<dyn CheckpointStore>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            handler,
            checkpoints,
            options,
        }
    }

    pub fn for_store<S: GraphStore + ?Sized>(
        store: &S,
        checkpoints: Arc<dyn CheckpointStore>,
        options: LoaderOptions,
    ) -> Self {
        let handler = EventHandler::for_store(store, options.handler);
        Self::new(handler, checkpoints, options)
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Loads from the checkpoint's `downloadDirectory`.
    pub fn load_download_directory<S: GraphStore + ?Sized>(
        &mut self,
        store: &mut S,
        checkpoint: Checkpoint,
    ) -> Result<LoadOutcome> {
        let root = checkpoint.download_directory().ok_or_else(|| {
            LoaderError::Config(format!(
                "{} must be set",
                crate::checkpoint::DOWNLOAD_DIRECTORY
            ))
        })?;
        self.load(store, &root, checkpoint)
    }

    /// Loads a single archive file or every archive below a directory.
    ///
    /// On failure the open transaction is rolled back; files completed
    /// before the failure stay committed and checkpointed.
    pub fn load<S: GraphStore + ?Sized>(
        &mut self,
        store: &mut S,
        root: &Path,
        checkpoint: Checkpoint,
    ) -> Result<LoadOutcome> {
        log::info!("loading from {}", root.display());
        fs::metadata(root)?;
        let started = Instant::now();
        let mut run = Run {
            root: root.to_path_buf(),
            last: checkpoint.last_hour_loaded()?,
            checkpoint,
            report: LoadReport::default(),
        };

        if let Err(err) = self.visit(store, root, &mut run) {
            if let Err(rollback) = store.rollback() {
                log::error!("rollback after failed load also failed: {rollback}");
            }
            return Err(err);
        }

        run.report.elapsed = started.elapsed();
        log::info!(
            "loaded {} events from {} files in {}ms",
            run.report.lines,
            run.report.files_loaded,
            run.report.elapsed.as_millis()
        );
        Ok(LoadOutcome {
            checkpoint: run.checkpoint,
            report: run.report,
        })
    }

    fn visit<S: GraphStore + ?Sized>(&mut self, store: &mut S, path: &Path, run: &mut Run) -> Result<()> {
        if !path.is_dir() {
            return self.visit_file(store, path, run);
        }
        let mut children: Vec<(ArchiveFileKey, PathBuf)> = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|child| (ArchiveFileKey::for_path(&child), child))
            .collect();
        children.sort();
        for (_, child) in children {
            self.visit(store, &child, run)?;
        }
        Ok(())
    }

    fn visit_file<S: GraphStore + ?Sized>(&mut self, store: &mut S, path: &Path, run: &mut Run) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_json_archive(&name) {
            log::warn!("file does not appear to be line-delimited JSON: {}", path.display());
            run.report.files_ignored += 1;
            return Ok(());
        }
        let Some(hour) = ArchiveFileKey::for_path(path).hour() else {
            return self.visit_unplaced_file(store, path, run);
        };
        if run.last.is_some_and(|last| hour <= last) {
            log::debug!("skipping already loaded file {}", path.display());
            run.report.files_skipped += 1;
            return Ok(());
        }

        self.load_file(store, path, run)?;

        run.checkpoint.set_last_file_loaded(path);
        self.checkpoints.save(&run.checkpoint)?;
        run.last = Some(hour);
        run.report.files_loaded += 1;
        Ok(())
    }

    /// A JSON file with no archive hour in its name cannot be compared with
    /// the checkpoint. It loads when named directly or when nothing has been
    /// loaded yet, and never moves the checkpoint.
    fn visit_unplaced_file<S: GraphStore + ?Sized>(
        &mut self,
        store: &mut S,
        path: &Path,
        run: &mut Run,
    ) -> Result<()> {
        if path != run.root && run.last.is_some() {
            log::warn!(
                "skipping {}: not named by archive hour and a checkpoint is set",
                path.display()
            );
            run.report.files_skipped += 1;
            return Ok(());
        }
        self.load_file(store, path, run)?;
        run.report.files_loaded += 1;
        Ok(())
    }

    /// Assembles every line of one file and commits. Returns the line count.
    fn load_file<S: GraphStore + ?Sized>(&mut self, store: &mut S, path: &Path, run: &mut Run) -> Result<u64> {
        let started = Instant::now();
        if self.options.verbose {
            log::info!("loading file: {}", path.display());
        }

        let mut lines = 0u64;
        for (index, line) in open_lines(path)?.lines().enumerate() {
            let line_no = index as u64 + 1;
            let handled = line.map_err(LoaderError::from).and_then(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return Ok(false);
                }
                let event = Event::from_json(line)?;
                self.handler.handle(store, &event)?;
                Ok(true)
            });
            match handled {
                Ok(false) => {}
                Ok(true) => {
                    lines += 1;
                    run.report.lines += 1;
                    if self.options.closes_batch(lines) {
                        store.commit()?;
                    }
                }
                Err(err) => {
                    log::error!("error on line {line_no} in {}: {err}", path.display());
                    return Err(LoaderError::Line {
                        file: path.to_path_buf(),
                        line: line_no,
                        source: Box::new(err),
                    });
                }
            }
        }

        store.commit()?;
        if self.options.verbose {
            log::info!(
                "finished reading {lines} lines in {}ms",
                started.elapsed().as_millis()
            );
        }
        Ok(lines)
    }
}
