use anyhow::{Context, Result};
use std::path::Path;

use crate::handlers::AppContext;
use crate::utils::validate_bucket_name;

pub async fn run_upload(ctx: &AppContext, bucket: &str, source: &Path, dest_prefix: &str) -> Result<()> {
    validate_bucket_name(bucket)?;
    ctx.sync
        .upload_dir(bucket, source, dest_prefix)
        .await
        .with_context(|| format!("uploading {} to {bucket}/{dest_prefix}", source.display()))?;
    Ok(())
}
