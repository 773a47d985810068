use std::path::Path;

use ghgraph::load_archives;
use ghloader::LoaderOptions;
use gstorage::catalog::Catalog;
use gstorage::graph::GraphStore;
use gstorage::models::TaskStatus;
use gstorage::sqlite::SqliteGraph;
use tempfile::tempdir;

const PUSH: &str = r#"{"type":"PushEvent","created_at":"2014-05-31T09:15:00Z","actor":{"login":"octocat","id":1},"repo":{"id":1296269,"name":"octocat/Hello-World"},"payload":{"size":1,"shas":["6dcb09b5b57875f334f61aebed695e2e4193db5e"]}}"#;

fn write_state(state: &Path, archives: &Path, db: &Path) -> anyhow::Result<()> {
    std::fs::write(
        state,
        format!(
            "# test state\ndownloadDirectory={}\nstorage.backend=sqlite\nstorage.directory={}\n",
            archives.display(),
            db.display()
        ),
    )?;
    Ok(())
}

#[test]
fn load_persists_graph_state_and_run_log() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let archives = dir.path().join("archives");
    let db = dir.path().join("db");
    std::fs::create_dir_all(&archives)?;
    std::fs::write(archives.join("2014-05-31-9.json"), format!("{PUSH}\n{PUSH}\n"))?;
    let state = dir.path().join("github.properties");
    write_state(&state, &archives, &db)?;

    let report = load_archives(&state, None, LoaderOptions::default())?;
    assert_eq!(report.lines, 2);
    assert_eq!(report.files_loaded, 1);

    let again = load_archives(&state, None, LoaderOptions::default())?;
    assert_eq!(again.files_loaded, 0);
    assert_eq!(again.files_skipped, 1);

    let mut graph = SqliteGraph::open(&db.join("graph.sqlite"))?;
    // two events, one user, one repository
    assert_eq!(graph.vertex_count()?, 4);

    let saved = std::fs::read_to_string(&state)?;
    assert!(saved.contains("lastFileLoaded="));
    assert!(saved.contains("storage.backend=sqlite"));

    let catalog = Catalog::open(&db.join("catalog.sqlite"))?;
    let runs = catalog.recent_task_logs(10)?;
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.task_name == "load"));
    assert!(runs.iter().all(|r| r.status == TaskStatus::Success));
    Ok(())
}

#[test]
fn failed_load_is_recorded() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let archives = dir.path().join("archives");
    let db = dir.path().join("db");
    std::fs::create_dir_all(&archives)?;
    std::fs::write(archives.join("2014-05-31-9.json"), format!("{PUSH}\n[1,2\n"))?;
    let state = dir.path().join("github.properties");
    write_state(&state, &archives, &db)?;

    assert!(load_archives(&state, None, LoaderOptions::default()).is_err());

    let catalog = Catalog::open(&db.join("catalog.sqlite"))?;
    let runs = catalog.recent_task_logs(10)?;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, TaskStatus::Failed);
    assert!(runs[0].details.contains("line 2"));

    let mut graph = SqliteGraph::open(&db.join("graph.sqlite"))?;
    assert_eq!(graph.vertex_count()?, 0);
    Ok(())
}

#[test]
fn explicit_path_overrides_download_directory() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let elsewhere = dir.path().join("elsewhere");
    std::fs::create_dir_all(&elsewhere)?;
    let file = elsewhere.join("2014-05-31-9.json");
    std::fs::write(&file, format!("{PUSH}\n"))?;
    let state = dir.path().join("github.properties");
    std::fs::write(&state, "storage.backend=memory\n")?;

    let report = load_archives(&state, Some(&file), LoaderOptions::batched(1))?;
    assert_eq!(report.lines, 1);
    Ok(())
}
