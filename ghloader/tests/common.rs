use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use ghloader::checkpoint::MemoryCheckpointStore;
use ghloader::identity::IdentityResolver;
use ghloader::{EventHandler, Loader, LoaderOptions};
use gstorage::memory::MemoryGraph;
use gstorage::utils::id::TaggedIdPolicy;
use serde_json::json;
use tempfile::TempDir;

#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub archive_dir: PathBuf,
    pub checkpoints: Arc<MemoryCheckpointStore>,
}

#[allow(dead_code)]
pub fn init_test_context() -> anyhow::Result<TestContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = tempfile::tempdir()?;
    let archive_dir = temp_dir.path().join("archives");
    std::fs::create_dir_all(&archive_dir)?;
    Ok(TestContext {
        temp_dir,
        archive_dir,
        checkpoints: Arc::new(MemoryCheckpointStore::new()),
    })
}

#[allow(dead_code)]
pub fn loader(ctx: &TestContext, options: LoaderOptions) -> Loader {
    let handler = EventHandler::with_resolver(
        IdentityResolver::with_seed(Arc::new(TaggedIdPolicy::default()), 42),
        options.handler,
    );
    Loader::new(handler, ctx.checkpoints.clone(), options)
}

#[allow(dead_code)]
pub fn memory_graph() -> MemoryGraph {
    MemoryGraph::new()
}

/// A legacy-format watch event.
#[allow(dead_code)]
pub fn watch_line(login: &str, repo_id: i64, created_at: &str) -> String {
    json!({
        "type": "WatchEvent",
        "created_at": created_at,
        "public": true,
        "actor": login,
        "actor_attributes": { "login": login, "type": "User" },
        "repository": { "id": repo_id, "name": format!("repo-{repo_id}"), "owner": login },
        "payload": { "action": "started" }
    })
    .to_string()
}

#[allow(dead_code)]
pub fn write_archive(dir: &Path, name: &str, lines: &[String]) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let mut file = File::create(&path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(path)
}

/// Writes each chunk of lines as its own gzip member.
#[allow(dead_code)]
pub fn gzip_members(chunks: &[&[String]]) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in chunks {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for line in chunk.iter() {
            writeln!(encoder, "{line}")?;
        }
        out.extend(encoder.finish()?);
    }
    Ok(out)
}

#[allow(dead_code)]
pub fn write_gz_archive(dir: &Path, name: &str, chunks: &[&[String]]) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, gzip_members(chunks)?)?;
    Ok(path)
}
