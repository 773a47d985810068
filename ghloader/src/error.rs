use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("no valid identifier for '{key}' after {attempts} attempts")]
    IdentitySpaceExhausted { key: String, attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] gstorage::errors::StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("error on line {line} in {}: {source}", file.display())]
    Line {
        file: PathBuf,
        line: u64,
        #[source]
        source: Box<LoaderError>,
    },
}

impl LoaderError {
    /// Errors that indicate a systemic problem rather than one bad record.
    pub fn is_fatal_to_process(&self) -> bool {
        match self {
            LoaderError::IdentitySpaceExhausted { .. } => true,
            LoaderError::Line { source, .. } => source.is_fatal_to_process(),
            _ => false,
        }
    }

    /// Strips any line-context wrapper.
    pub fn root(&self) -> &LoaderError {
        match self {
            LoaderError::Line { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_wrapper_reports_context_and_root() {
        let err = LoaderError::Line {
            file: PathBuf::from("2014-05-31-10.json"),
            line: 7,
            source: Box::new(LoaderError::IdentitySpaceExhausted {
                key: "user:octocat".to_string(),
                attempts: 64,
            }),
        };
        assert!(err.to_string().contains("line 7 in 2014-05-31-10.json"));
        assert!(err.is_fatal_to_process());
        assert!(matches!(err.root(), LoaderError::IdentitySpaceExhausted { .. }));
        assert!(!LoaderError::InvalidEvent("x".into()).is_fatal_to_process());
    }
}
