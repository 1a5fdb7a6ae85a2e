use mime_guess;
use std::path::Path;

use crate::error::{Result, SyncError};

/// Determines the MIME type of a file based on its extension.
/// Provides custom mappings for report assets and falls back to mime_guess.
pub fn get_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "zip" => "application/zip",
        "jsonl" => "application/x-ndjson",
        "json" => "application/json",
        "webm" => "video/webm",
        "css" => "text/css",
        "js" => "application/javascript",
        "html" | "htm" => "text/html",
        _ => mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream"),
    }
}

/// Validates a bucket name against the rules shared by S3 and GCS:
/// 3-63 chars of lowercase letters, digits, '-', '_' and '.',
/// starting and ending with a letter or digit.
pub fn validate_bucket_name(bucket: &str) -> Result<()> {
    let bucket = bucket.trim();
    if bucket.is_empty() {
        return Err(SyncError::Config("bucket name must not be empty".into()));
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if bucket.len() < 3
        || bucket.len() > 63
        || !bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
        || !edge_ok(bucket.chars().next())
        || !edge_ok(bucket.chars().last())
    {
        return Err(SyncError::Config(format!(
            "invalid bucket name {bucket:?} (3-63 chars: lowercase letters, digits, '-', '_', '.')"
        )));
    }
    Ok(())
}

/// Validates glob patterns and returns the ones that fail to compile.
pub fn validate_glob_patterns(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .filter(|p| glob::Pattern::new(p).is_err())
        .cloned()
        .collect()
}

/// Formats a byte count for log lines.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
