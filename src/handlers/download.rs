use anyhow::{Context, Result};
use std::path::Path;

use crate::handlers::AppContext;
use crate::s3::{DownloadLayout, DownloadOptions, EmptyPolicy};
use crate::utils::validate_bucket_name;

/// `--strict` on the command line or `strict_download` in the config makes an
/// empty listing fatal.
pub fn download_options(ctx: &AppContext, strict: bool, flatten: bool) -> DownloadOptions {
    DownloadOptions {
        empty: if strict || ctx.config.strict_download {
            EmptyPolicy::Strict
        } else {
            EmptyPolicy::Lenient
        },
        layout: if flatten {
            DownloadLayout::Flatten
        } else {
            DownloadLayout::Preserve
        },
    }
}

pub async fn run_download(
    ctx: &AppContext,
    bucket: &str,
    prefix: &str,
    dest: &Path,
    strict: bool,
    flatten: bool,
) -> Result<()> {
    validate_bucket_name(bucket)?;
    let options = download_options(ctx, strict, flatten);
    ctx.sync
        .download_prefix(bucket, prefix, dest, options)
        .await
        .with_context(|| format!("downloading {bucket}/{prefix} to {}", dest.display()))?;
    Ok(())
}
