use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, SyncError};
use crate::s3::prefix::run_blob_prefix;

const APP_NAME: &str = "blob-sync";

/// Which store backs the bucket operations.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// AWS S3 or any S3-compatible endpoint (GCS interoperability, MinIO).
    #[default]
    S3,
    /// Directory on the local filesystem, one subdirectory per bucket.
    Local,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MergeConfig {
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Program and arguments; the staging directory is appended last.
    #[serde(default = "default_merge_command")]
    pub command: Vec<String>,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./blob-reports")
}

fn default_merge_command() -> Vec<String> {
    ["npx", "playwright", "merge-reports", "--reporter", "html"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            command: default_merge_command(),
        }
    }
}

fn default_concurrency() -> usize {
    16
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: Backend,
    /// Root directory for the `local` backend.
    #[serde(default)]
    pub local_root: Option<PathBuf>,
    /// Region override; the ambient AWS chain is used when unset.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint, e.g. `https://storage.googleapis.com` for GCS.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Treat an empty download listing as an error.
    #[serde(default)]
    pub strict_download: bool,
    /// Globs matched against paths relative to the upload root.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Directory for the daily log file; empty disables file logging.
    #[serde(default)]
    pub log_path: String,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            local_root: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            concurrency: default_concurrency(),
            strict_download: false,
            exclude_patterns: Vec::new(),
            log_path: String::new(),
            merge: MergeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Applies `BLOB_SYNC_*` overrides from the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("BLOB_SYNC_BACKEND") {
            self.backend = match backend.trim().to_lowercase().as_str() {
                "s3" => Backend::S3,
                "local" => Backend::Local,
                other => {
                    return Err(SyncError::Config(format!(
                        "BLOB_SYNC_BACKEND must be 's3' or 'local', got {other:?}"
                    )));
                }
            };
        }
        if let Some(root) = get("BLOB_SYNC_LOCAL_ROOT") {
            self.local_root = Some(PathBuf::from(root));
            self.backend = Backend::Local;
        }
        if let Some(region) = get("BLOB_SYNC_REGION") {
            self.region = Some(region);
        }
        if let Some(endpoint) = get("BLOB_SYNC_ENDPOINT") {
            self.endpoint_url = Some(endpoint);
        }
        if let Some(concurrency) = get("BLOB_SYNC_CONCURRENCY") {
            self.concurrency = concurrency.trim().parse().map_err(|_| {
                SyncError::Config(format!(
                    "BLOB_SYNC_CONCURRENCY must be a positive integer, got {concurrency:?}"
                ))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SyncError::Config("concurrency must be at least 1".into()));
        }
        if self.backend == Backend::Local && self.local_root.is_none() {
            return Err(SyncError::Config(
                "the local backend requires local_root (or BLOB_SYNC_LOCAL_ROOT)".into(),
            ));
        }
        let invalid = crate::utils::validate_glob_patterns(&self.exclude_patterns);
        if let Some(pattern) = invalid.into_iter().next() {
            return Err(SyncError::Pattern {
                reason: "not a valid glob".into(),
                pattern,
            });
        }
        if self.merge.command.is_empty() {
            return Err(SyncError::Config("merge.command must not be empty".into()));
        }
        Ok(())
    }
}

/// Load config from file, or from the per-user config location.
///
/// An explicit `path` must already exist; only the per-user file is
/// created with defaults on first run.
pub fn try_load_config(path: Option<&Path>) -> Result<AppConfig> {
    let loaded = match path {
        Some(path) if !path.exists() => {
            return Err(SyncError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Some(path) => confy::load_path(path),
        None => confy::load(APP_NAME, None),
    };
    loaded.map_err(|e| SyncError::Config(e.to_string()))
}

/// Returns default if the file is missing or invalid.
pub fn load_config_or_default(loaded: Result<AppConfig>) -> AppConfig {
    match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Could not load config, falling back to defaults: {}", e);
            AppConfig::default()
        }
    }
}

/// Get the config file path for debugging purposes.
pub fn get_config_path() -> Option<PathBuf> {
    confy::get_configuration_file_path(APP_NAME, None).ok()
}

/// Settings the merge workflow reads from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEnv {
    pub bucket: String,
    pub run_id: String,
}

impl MergeEnv {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Both `BUCKET` and `RUN_ID` must be set and non-empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup("BUCKET").filter(|v| !v.trim().is_empty());
        let run_id = lookup("RUN_ID").filter(|v| !v.trim().is_empty());
        match (bucket, run_id) {
            (Some(bucket), Some(run_id)) => Ok(Self { bucket, run_id }),
            _ => Err(SyncError::Config(
                "BUCKET and RUN_ID env vars must be set".into(),
            )),
        }
    }

    pub fn prefix(&self) -> String {
        run_blob_prefix(&self.run_id)
    }
}
