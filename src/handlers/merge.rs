//! Merge workflow: stage every shard blob for a run, then hand the staging
//! directory to the external report merger.

use anyhow::Result;
use std::path::Path;
use std::process::Stdio;
use tracing::info;

use crate::config::MergeEnv;
use crate::error::SyncError;
use crate::handlers::AppContext;
use crate::s3::prefix::validate_run_id;
use crate::s3::{DownloadLayout, DownloadOptions, EmptyPolicy};
use crate::utils::validate_bucket_name;

pub async fn run_merge(ctx: &AppContext, env: &MergeEnv) -> Result<()> {
    validate_bucket_name(&env.bucket)?;
    validate_run_id(&env.run_id)?;

    let prefix = env.prefix();
    let staging = &ctx.config.merge.staging_dir;
    info!("Downloading shards from {}/{}", env.bucket, prefix);

    tokio::fs::create_dir_all(staging)
        .await
        .map_err(|e| SyncError::io(staging, e))?;

    // Blob report file names are unique per shard, so they can share one directory.
    let options = DownloadOptions {
        empty: EmptyPolicy::Strict,
        layout: DownloadLayout::Flatten,
    };
    let summary = ctx
        .sync
        .download_prefix(&env.bucket, &prefix, staging, options)
        .await
        .map_err(|e| match e {
            SyncError::EmptyListing { .. } => {
                anyhow::Error::new(e).context("No shard files found in bucket")
            }
            other => anyhow::Error::new(other).context("staging shard blobs"),
        })?;
    info!("Staged {} blob files in {}", summary.objects, staging.display());

    info!("Merging blob reports...");
    run_merge_command(&ctx.config.merge.command, staging).await?;
    info!("Report merged successfully");
    Ok(())
}

/// Runs `command` with `staging` as its last argument, inheriting stdio.
pub async fn run_merge_command(command: &[String], staging: &Path) -> Result<(), SyncError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| SyncError::Config("merge command is empty".into()))?;

    let status = tokio::process::Command::new(program)
        .args(args)
        .arg(staging)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| SyncError::Runner(format!("failed to start {program}: {e}")))?;

    if !status.success() {
        return Err(SyncError::Runner(format!("{program} exited with {status}")));
    }
    Ok(())
}
