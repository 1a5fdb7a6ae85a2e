pub mod count;
pub mod download;
pub mod merge;
pub mod object;
pub mod upload;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cli::Command;
use crate::config::{AppConfig, Backend, MergeEnv};
use crate::error::SyncError;
use crate::s3::{BlobSync, LocalStore, S3Store, SharedStore, create_s3_client};

/// Everything a command handler needs, built once per invocation.
pub struct AppContext {
    pub config: AppConfig,
    pub sync: BlobSync,
}

impl AppContext {
    pub fn new(config: AppConfig, store: SharedStore) -> Result<Self> {
        let sync = BlobSync::new(store)
            .with_concurrency(config.concurrency)
            .with_exclude_patterns(&config.exclude_patterns)?;
        Ok(Self { config, sync })
    }

    /// Connects the backend named in the config.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let store = build_store(&config).await?;
        Self::new(config, store)
    }
}

pub async fn build_store(config: &AppConfig) -> Result<SharedStore, SyncError> {
    match config.backend {
        Backend::S3 => {
            let client = create_s3_client(config).await;
            info!(
                "Using S3 backend (endpoint: {})",
                config.endpoint_url.as_deref().unwrap_or("default")
            );
            let store: SharedStore = Arc::new(S3Store::new(client));
            Ok(store)
        }
        Backend::Local => {
            let root = config.local_root.clone().ok_or_else(|| {
                SyncError::Config("the local backend requires local_root".into())
            })?;
            info!("Using local backend rooted at {}", root.display());
            let store: SharedStore = Arc::new(LocalStore::new(root));
            Ok(store)
        }
    }
}

/// Runs one verb. Command output (the shard count) goes to `out`.
pub async fn dispatch(command: Command, ctx: &AppContext, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Upload {
            bucket,
            source_dir,
            dest_prefix,
        } => upload::run_upload(ctx, &bucket, &source_dir, &dest_prefix).await,
        Command::Download {
            bucket,
            prefix,
            dest_dir,
            strict,
            flatten,
        } => download::run_download(ctx, &bucket, &prefix, &dest_dir, strict, flatten).await,
        Command::Count {
            bucket,
            run_id,
            strict,
        } => count::run_count(ctx, &bucket, &run_id, strict, out).await,
        Command::UploadFile {
            bucket,
            file,
            dest_key,
        } => object::run_upload_file(ctx, &bucket, &file, &dest_key).await,
        Command::Delete { bucket, key } => object::run_delete(ctx, &bucket, &key).await,
        Command::Merge => {
            let env = MergeEnv::from_env()?;
            merge::run_merge(ctx, &env).await
        }
    }
}
