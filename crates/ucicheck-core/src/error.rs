use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Failures of the harness itself.
///
/// Engine misbehavior is never reported through this type; it is captured
/// as a [`crate::model::StageResult`] with a [`crate::model::FailType`].
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("config file not readable: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config in {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("search root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report JSON: {0}")]
    Json(#[from] serde_json::Error),
}
