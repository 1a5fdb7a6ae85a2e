use std::path::PathBuf;

use thiserror::Error;

/// Errors from blob sync operations.
///
/// Every variant is fatal for the batch that produced it; nothing is retried.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing environment variable, invalid bucket name, bad config value.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller required at least one object under the prefix.
    #[error("no objects found in bucket {bucket} under {prefix:?}")]
    EmptyListing { bucket: String, prefix: String },

    /// A storage call failed for one object (or for a listing).
    #[error("{op} failed for {key}: {source}")]
    Transfer {
        op: &'static str,
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk source directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Object key that does not fit the expected layout.
    #[error("malformed key {key:?}: {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("invalid exclude pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// Merge command failed to start or exited non-zero.
    #[error("merge command failed: {0}")]
    Runner(String),

    #[error("transfer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn transfer(
        op: &'static str,
        key: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transfer {
            op,
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_formats_variants() {
        assert_eq!(
            SyncError::Config("BUCKET and RUN_ID env vars must be set".into()).to_string(),
            "configuration error: BUCKET and RUN_ID env vars must be set"
        );
        assert_eq!(
            SyncError::EmptyListing {
                bucket: "reports".into(),
                prefix: "runs/42/blob/".into(),
            }
            .to_string(),
            "no objects found in bucket reports under \"runs/42/blob/\""
        );
        assert_eq!(
            SyncError::malformed("runs/1/blob/x", "not a shard folder").to_string(),
            "malformed key \"runs/1/blob/x\": not a shard folder"
        );
    }

    #[test]
    fn transfer_keeps_source() {
        let err = SyncError::transfer("upload", "a/b.json", "connection reset");
        assert!(err.to_string().contains("upload failed for a/b.json"));
        assert!(err.source().is_some());
    }

    #[test]
    fn io_reports_path() {
        let err = SyncError::io(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().starts_with("I/O error at /tmp/missing"));
    }
}
