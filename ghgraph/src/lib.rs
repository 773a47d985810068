use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ghloader::checkpoint::{Checkpoint, CheckpointStore, PropertiesCheckpointStore};
use ghloader::fetch::DEFAULT_BASE_URL;
use ghloader::{
    ArchiveDownloader, DownloadReport, HandlerOptions, HttpArchiveSource, LoadReport, Loader,
    LoaderOptions,
};
use gstorage::catalog::Catalog;
use gstorage::config::StorageConfig;
use gstorage::models::TaskStatus;
use gstorage::GStorage;
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Runs the command line interface for the archive loader.
pub async fn run_cli() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Load(args)) => run_load(args).await?,
        Some(Command::Fetch(args)) => run_fetch(args).await?,
        Some(Command::Status(args)) => run_status(args)?,
        None => {
            println!("No subcommand provided. Use --help to see available commands.");
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Loads archive files into the graph, resuming after the last loaded file
    Load(LoadArgs),
    /// Downloads hourly archives missing from the download directory
    Fetch(FetchArgs),
    /// Shows loader state, graph size and recent runs
    Status(StatusArgs),
}

#[derive(Args, Clone)]
struct StateArgs {
    /// Loader state file (properties format)
    #[arg(long, env = "GHGRAPH_STATE", default_value = "github.properties")]
    state: PathBuf,
}

#[derive(Args, Clone)]
struct LoadArgs {
    #[command(flatten)]
    state: StateArgs,
    /// File or directory to load instead of the configured download directory
    path: Option<PathBuf>,
    /// Lines per commit; 0 commits once per file
    #[arg(long, env = "GHGRAPH_BATCH_SIZE", default_value_t = 0)]
    batch_size: usize,
    /// Reject events with a missing or unknown type
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Log every file loaded
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

impl LoadArgs {
    fn options(&self) -> LoaderOptions {
        LoaderOptions {
            batch_size: self.batch_size,
            verbose: self.verbose,
            handler: HandlerOptions {
                strict_event_types: self.strict,
            },
        }
    }
}

#[derive(Args, Clone)]
struct FetchArgs {
    #[command(flatten)]
    state: StateArgs,
    /// Load the download directory once fetching finishes
    #[arg(long, default_value_t = false)]
    load: bool,
    /// Lines per commit for the follow-up load
    #[arg(long, env = "GHGRAPH_BATCH_SIZE", default_value_t = 0)]
    batch_size: usize,
}

#[derive(Args, Clone)]
struct StatusArgs {
    #[command(flatten)]
    state: StateArgs,
    /// Number of recent runs to show
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Records one run in the catalog, when there is one.
struct TaskRecorder {
    catalog: Option<Arc<Catalog>>,
    task_id: Option<i64>,
}

impl TaskRecorder {
    fn start(catalog: Option<Arc<Catalog>>, name: &str) -> Self {
        let task_id = catalog.as_ref().and_then(|c| match c.create_task_log(name) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("failed to record {name} run: {err}");
                None
            }
        });
        Self { catalog, task_id }
    }

    fn finish(&self, status: TaskStatus, details: serde_json::Value) {
        if let (Some(catalog), Some(id)) = (&self.catalog, self.task_id) {
            if let Err(err) = catalog.update_task_log_status(id, status, &details) {
                warn!("failed to update run {id}: {err}");
            }
        }
    }
}

fn open_catalog(config: &StorageConfig) -> anyhow::Result<Option<Arc<Catalog>>> {
    let Some(path) = config.catalog_path() else {
        return Ok(None);
    };
    if let Some(dir) = &config.directory {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let catalog = Catalog::open(&path).context("failed to open run catalog")?;
    catalog.initialize_schema()?;
    Ok(Some(Arc::new(catalog)))
}

fn load_report_json(report: &LoadReport) -> serde_json::Value {
    json!({
        "lines": report.lines,
        "files_loaded": report.files_loaded,
        "files_skipped": report.files_skipped,
        "files_ignored": report.files_ignored,
        "elapsed_ms": report.elapsed.as_millis() as u64,
    })
}

fn download_report_json(report: &DownloadReport) -> serde_json::Value {
    json!({
        "downloaded": report.downloaded.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "missing": report.missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "next_hour": report.next_hour.to_string(),
    })
}

/// Loads `path` (or the download directory) into the configured store.
pub fn load_archives(
    state_path: &Path,
    path: Option<&Path>,
    options: LoaderOptions,
) -> anyhow::Result<LoadReport> {
    let state = Arc::new(PropertiesCheckpointStore::new(state_path));
    let checkpoint = state
        .load()
        .with_context(|| format!("failed to read loader state {}", state_path.display()))?;
    let config = StorageConfig::from_properties(checkpoint.entries())?;
    let mut storage = GStorage::open(config).context("failed to open graph storage")?;
    let recorder = TaskRecorder::start(storage.catalog.clone(), "load");

    let mut loader = Loader::for_store(storage.graph.as_ref(), state, options);
    let graph = storage.graph.as_mut();
    let result = match path {
        Some(path) => loader.load(graph, path, checkpoint),
        None => loader.load_download_directory(graph, checkpoint),
    };

    match result {
        Ok(outcome) => {
            recorder.finish(TaskStatus::Success, load_report_json(&outcome.report));
            Ok(outcome.report)
        }
        Err(err) => {
            if err.is_fatal_to_process() {
                error!("identifier space exhausted; refusing to continue");
            }
            recorder.finish(TaskStatus::Failed, json!({ "error": err.to_string() }));
            Err(err.into())
        }
    }
}

async fn run_load(args: LoadArgs) -> anyhow::Result<()> {
    let options = args.options();
    let report = tokio::task::spawn_blocking(move || {
        load_archives(&args.state.state, args.path.as_deref(), options)
    })
    .await
    .context("load task panicked")??;

    info!(
        "loaded {} lines from {} files ({} skipped, {} ignored) in {}ms",
        report.lines,
        report.files_loaded,
        report.files_skipped,
        report.files_ignored,
        report.elapsed.as_millis()
    );
    Ok(())
}

/// Downloads every hour missing between the configured start and now.
pub async fn fetch_archives(state_path: &Path) -> anyhow::Result<DownloadReport> {
    let state = PropertiesCheckpointStore::new(state_path);
    let checkpoint: Checkpoint = state
        .load()
        .with_context(|| format!("failed to read loader state {}", state_path.display()))?;
    let config = StorageConfig::from_properties(checkpoint.entries())?;
    let recorder = TaskRecorder::start(open_catalog(&config)?, "fetch");

    let base_url = checkpoint.archive_base_url().unwrap_or(DEFAULT_BASE_URL);
    let source = HttpArchiveSource::new(base_url)?;
    let downloader = ArchiveDownloader::from_checkpoint(source, &checkpoint)?;

    match downloader.download_missing(chrono::Utc::now()).await {
        Ok(report) => {
            recorder.finish(TaskStatus::Success, download_report_json(&report));
            Ok(report)
        }
        Err(err) => {
            recorder.finish(TaskStatus::Failed, json!({ "error": err.to_string() }));
            Err(err.into())
        }
    }
}

async fn run_fetch(args: FetchArgs) -> anyhow::Result<()> {
    let report = fetch_archives(&args.state.state).await?;
    info!(
        "downloaded {} archives, {} hours missing, next hour {}",
        report.downloaded.len(),
        report.missing.len(),
        report.next_hour
    );

    if args.load {
        run_load(LoadArgs {
            state: args.state,
            path: None,
            batch_size: args.batch_size,
            strict: false,
            verbose: false,
        })
        .await?;
    }
    Ok(())
}

fn run_status(args: StatusArgs) -> anyhow::Result<()> {
    let state = PropertiesCheckpointStore::new(&args.state.state);
    let checkpoint = state.load()?;
    println!("state file:         {}", args.state.state.display());
    for (label, value) in [
        ("download directory", checkpoint.download_directory().map(|d| d.display().to_string())),
        ("last file loaded", checkpoint.last_file_loaded().map(str::to_string)),
        ("start hour", Some(checkpoint.start_hour()?.to_string())),
        ("end hour", checkpoint.end_hour()?.map(|h| h.to_string())),
    ] {
        println!("{label:<19} {}", value.as_deref().unwrap_or("-"));
    }

    let config = StorageConfig::from_properties(checkpoint.entries())?;
    let mut storage = GStorage::open(config)?;
    println!("vertices:           {}", storage.graph.vertex_count()?);
    println!("edges:              {}", storage.graph.edge_count()?);

    if let Some(catalog) = &storage.catalog {
        for log in catalog.recent_task_logs(args.limit)? {
            println!(
                "run {:>4} {:<6} {:<8} started {} {}",
                log.task_id,
                log.task_name,
                log.status.as_str(),
                log.start_time,
                log.details
            );
        }
    }
    Ok(())
}
