use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tokio::fs;
use url::Url;

use crate::checkpoint::{Checkpoint, DOWNLOAD_DIRECTORY};
use crate::error::{LoaderError, Result};
use crate::timestamp::ArchiveHour;

pub const DEFAULT_BASE_URL: &str = "http://data.githubarchive.org";

/// Outcome of asking a source for one hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Found(Vec<u8>),
    NotFound,
}

/// Where hourly archives come from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch(&self, hour: ArchiveHour) -> Result<Fetched>;
}

/// File name an hour is published and stored under.
pub fn archive_file_name(hour: ArchiveHour) -> String {
    format!("{hour}.json.gz")
}

/// Fetches `<base-url>/<YYYY-MM-DD-H>.json.gz` over HTTP.
#[derive(Clone, Debug)]
pub struct HttpArchiveSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpArchiveSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn url_for(&self, hour: ArchiveHour) -> Result<Url> {
        Ok(self.base_url.join(&archive_file_name(hour))?)
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(&self, hour: ArchiveHour) -> Result<Fetched> {
        let url = self.url_for(hour)?;
        log::info!("downloading {url}");
        let response = self.client.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            log::info!("no such file: {url}");
            return Ok(Fetched::NotFound);
        }
        let body = response.error_for_status()?.bytes().await?;
        Ok(Fetched::Found(body.to_vec()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: Vec<ArchiveHour>,
    pub missing: Vec<ArchiveHour>,
    /// First hour the next run will probe.
    pub next_hour: ArchiveHour,
}

/// Fills a download directory with every published hour between the
/// configured start and `min(now, endHour)`.
pub struct ArchiveDownloader<A: ArchiveSource> {
    source: A,
    directory: PathBuf,
    start_hour: ArchiveHour,
    end_hour: Option<ArchiveHour>,
}

impl<A: ArchiveSource> ArchiveDownloader<A> {
    pub fn new(
        source: A,
        directory: impl Into<PathBuf>,
        start_hour: ArchiveHour,
        end_hour: Option<ArchiveHour>,
    ) -> Self {
        Self {
            source,
            directory: directory.into(),
            start_hour,
            end_hour,
        }
    }

    pub fn from_checkpoint(source: A, checkpoint: &Checkpoint) -> Result<Self> {
        let directory = checkpoint
            .download_directory()
            .ok_or_else(|| LoaderError::Config(format!("{DOWNLOAD_DIRECTORY} must be set")))?;
        Ok(Self::new(
            source,
            directory,
            checkpoint.start_hour()?,
            checkpoint.end_hour()?,
        ))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn source(&self) -> &A {
        &self.source
    }

    /// Clears stale temp files and returns the newest archive hour present.
    async fn scan_directory(&self) -> Result<Option<ArchiveHour>> {
        let mut newest: Option<ArchiveHour> = None;
        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".tmp") {
                log::debug!("removing stale download {}", path.display());
                fs::remove_file(&path).await?;
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Ok(hour) = ArchiveHour::from_file_name(&name) {
                newest = newest.max(Some(hour));
            }
        }
        Ok(newest)
    }

    /// Probes hour by hour until the next hour is after `now` or after the
    /// end bound. Hours the source does not have are recorded and passed over.
    pub async fn download_missing(&self, now: DateTime<Utc>) -> Result<DownloadReport> {
        fs::create_dir_all(&self.directory).await?;

        let mut current = self.start_hour;
        if let Some(newest) = self.scan_directory().await? {
            if newest >= current {
                current = newest.next_hour();
            }
        }

        let mut report = DownloadReport {
            downloaded: Vec::new(),
            missing: Vec::new(),
            next_hour: current,
        };
        while current.start() <= now && self.end_hour.map_or(true, |end| current <= end) {
            let hour = current;
            current = current.next_hour();
            match self.source.fetch(hour).await? {
                Fetched::NotFound => report.missing.push(hour),
                Fetched::Found(bytes) => {
                    let name = archive_file_name(hour);
                    let temp = self.directory.join(format!("{name}.tmp"));
                    fs::write(&temp, &bytes).await?;
                    fs::rename(&temp, self.directory.join(&name)).await?;
                    report.downloaded.push(hour);
                }
            }
        }
        report.next_hour = current;
        log::info!(
            "downloaded {} archives, {} hours missing",
            report.downloaded.len(),
            report.missing.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_the_hour_convention() {
        let source = HttpArchiveSource::new("https://example.org/archive").unwrap();
        let hour: ArchiveHour = "2014-05-31-9".parse().unwrap();
        assert_eq!(
            source.url_for(hour).unwrap().as_str(),
            "https://example.org/archive/2014-05-31-9.json.gz"
        );
        let default = HttpArchiveSource::new(DEFAULT_BASE_URL).unwrap();
        assert_eq!(
            default.url_for(hour).unwrap().as_str(),
            "http://data.githubarchive.org/2014-05-31-9.json.gz"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(matches!(
            HttpArchiveSource::new("not a url"),
            Err(LoaderError::Url(_))
        ));
    }

    #[test]
    fn downloader_requires_a_directory() {
        let source = HttpArchiveSource::new(DEFAULT_BASE_URL).unwrap();
        let result = ArchiveDownloader::from_checkpoint(source, &Checkpoint::new());
        assert!(matches!(result, Err(LoaderError::Config(_))));
    }
}
