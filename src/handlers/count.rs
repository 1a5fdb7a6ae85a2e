use anyhow::{Context, Result, bail};
use std::io::Write;

use crate::handlers::AppContext;
use crate::utils::validate_bucket_name;

/// Prints the number of distinct shard folders for `run_id` to `out`.
pub async fn run_count(
    ctx: &AppContext,
    bucket: &str,
    run_id: &str,
    strict: bool,
    out: &mut impl Write,
) -> Result<()> {
    validate_bucket_name(bucket)?;
    let shards = ctx
        .sync
        .count_shard_folders(bucket, run_id)
        .await
        .with_context(|| format!("counting shards for run {run_id} in {bucket}"))?;

    if strict && !shards.malformed.is_empty() {
        bail!(
            "{} key(s) under runs/{run_id}/blob/ do not fit the shard layout, first: {}",
            shards.malformed.len(),
            shards.malformed[0]
        );
    }
    writeln!(out, "{}", shards.count()).context("writing shard count")?;
    Ok(())
}
