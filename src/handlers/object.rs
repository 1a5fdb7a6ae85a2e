use anyhow::{Context, Result};
use std::path::Path;

use crate::handlers::AppContext;
use crate::utils::validate_bucket_name;

pub async fn run_upload_file(ctx: &AppContext, bucket: &str, file: &Path, key: &str) -> Result<()> {
    validate_bucket_name(bucket)?;
    ctx.sync
        .upload_file(bucket, file, key)
        .await
        .with_context(|| format!("uploading {} to {bucket}/{key}", file.display()))?;
    Ok(())
}

pub async fn run_delete(ctx: &AppContext, bucket: &str, key: &str) -> Result<()> {
    validate_bucket_name(bucket)?;
    ctx.sync
        .delete_file(bucket, key)
        .await
        .with_context(|| format!("deleting {bucket}/{key}"))?;
    Ok(())
}
