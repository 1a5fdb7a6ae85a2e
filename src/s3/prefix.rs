//! Object key helpers.
//!
//! Keys are "/"-delimited strings. A "directory" is only a shared prefix; a key
//! ending in "/" is a placeholder object with no content of its own.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SyncError};

static SHARD_FOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^shard-\d+$").expect("valid regex"));

/// Returns true for directory placeholder keys.
pub fn is_placeholder(key: &str) -> bool {
    key.ends_with('/')
}

/// Joins a destination prefix and a relative key fragment with exactly one "/".
///
/// `rel` is expected to come from [`relative_key`], which already splits on
/// host separators; a `\` left in it is part of a file name.
pub fn join_key(prefix: &str, rel: &str) -> String {
    let rel = rel.trim_start_matches('/');
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        rel.to_string()
    } else if rel.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{rel}")
    }
}

/// Converts a path relative to an upload root into a key fragment.
pub fn relative_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Maps an object key under `prefix` to a safe relative local path.
///
/// The prefix is stripped and any leading "/" left behind is dropped. When
/// nothing remains (the prefix named the object itself) the key's last
/// segment is used. Keys that would escape the destination are rejected.
pub fn local_relative_path(prefix: &str, key: &str) -> Result<PathBuf> {
    let remainder = key.strip_prefix(prefix).unwrap_or(key).trim_start_matches('/');
    let remainder = if remainder.is_empty() {
        key_basename(key)
    } else {
        remainder
    };
    if remainder.is_empty() {
        return Err(SyncError::malformed(key, "key has no file name"));
    }

    let mut out = PathBuf::new();
    for segment in remainder.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(SyncError::malformed(key, "key escapes the destination directory")),
            s if !is_host_file_name(s) => {
                return Err(SyncError::malformed(key, "key segment is not a valid file name here"));
            }
            s => out.push(s),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(SyncError::malformed(key, "key has no file name"));
    }
    Ok(out)
}

// Windows reads `\` as a separator and `:` as a drive or stream marker.
#[cfg(windows)]
fn is_host_file_name(segment: &str) -> bool {
    !segment.contains(['\\', ':'])
}

#[cfg(not(windows))]
fn is_host_file_name(_segment: &str) -> bool {
    true
}

/// Last "/"-segment of a key, ignoring a trailing "/".
pub fn key_basename(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Checks that a run id can be embedded as a single key segment.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    if run_id.trim().is_empty() {
        return Err(SyncError::Config("run id must not be empty".into()));
    }
    if run_id.contains('/') {
        return Err(SyncError::Config(format!(
            "run id {run_id:?} must not contain '/'"
        )));
    }
    Ok(())
}

/// `runs/<runId>/blob/`
pub fn run_blob_prefix(run_id: &str) -> String {
    format!("runs/{run_id}/blob/")
}

/// `runs/<runId>/blob/shard-`, the listing prefix for shard folders.
pub fn shard_listing_prefix(run_id: &str) -> String {
    format!("{}shard-", run_blob_prefix(run_id))
}

/// A key parsed as `runs/<runId>/blob/shard-<n>/<rest>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardKey<'a> {
    pub folder: &'a str,
    pub shard: u32,
    /// Path inside the shard folder; empty for the folder placeholder.
    pub rest: &'a str,
}

impl<'a> ShardKey<'a> {
    /// Parses `key` against the layout for `run_id`.
    ///
    /// The shard folder must be followed by "/": a bare `.../shard-1` object
    /// has no folder to belong to and is rejected.
    pub fn parse(key: &'a str, run_id: &str) -> Result<Self> {
        let base = run_blob_prefix(run_id);
        let below = key
            .strip_prefix(base.as_str())
            .ok_or_else(|| SyncError::malformed(key, format!("expected prefix {base:?}")))?;
        let (folder, rest) = below
            .split_once('/')
            .ok_or_else(|| SyncError::malformed(key, "object sits directly at shard depth"))?;
        if !SHARD_FOLDER.is_match(folder) {
            return Err(SyncError::malformed(
                key,
                format!("segment {folder:?} is not a shard-<n> folder"),
            ));
        }
        let shard = folder["shard-".len()..]
            .parse()
            .map_err(|_| SyncError::malformed(key, "shard number out of range"))?;
        Ok(Self { folder, shard, rest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_key_normalizes_separators() {
        assert_eq!(join_key("runs/1/blob/shard-1", "report.zip"), "runs/1/blob/shard-1/report.zip");
        assert_eq!(join_key("runs/1/blob/shard-1/", "report.zip"), "runs/1/blob/shard-1/report.zip");
        assert_eq!(join_key("", "a/b.json"), "a/b.json");
        assert_eq!(join_key("p", "/a/b.json"), "p/a/b.json");
        assert_eq!(join_key("p", ""), "p");
    }

    #[test]
    fn relative_key_drops_curdir() {
        assert_eq!(relative_key(Path::new("./a/b/c.json")), "a/b/c.json");
        assert_eq!(relative_key(Path::new("file.zip")), "file.zip");
    }

    #[test]
    fn local_path_strips_prefix() {
        assert_eq!(
            local_relative_path("runs/1/blob/", "runs/1/blob/shard-1/r.zip").unwrap(),
            PathBuf::from("shard-1").join("r.zip")
        );
        // No trailing slash on the prefix.
        assert_eq!(
            local_relative_path("runs/1/blob", "runs/1/blob/shard-2/r.zip").unwrap(),
            PathBuf::from("shard-2").join("r.zip")
        );
    }

    #[test]
    fn local_path_for_exact_key_uses_basename() {
        assert_eq!(
            local_relative_path("runs/1/blob/shard-1/r.zip", "runs/1/blob/shard-1/r.zip").unwrap(),
            PathBuf::from("r.zip")
        );
    }

    #[test]
    fn local_path_rejects_traversal() {
        let err = local_relative_path("p/", "p/../../etc/passwd").unwrap_err();
        assert!(matches!(err, SyncError::MalformedKey { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn local_path_keeps_unix_file_names() {
        assert_eq!(
            local_relative_path("p/", "p/trace-12:30.json").unwrap(),
            PathBuf::from("trace-12:30.json")
        );
        assert_eq!(
            local_relative_path("p/", "p/a\\b.txt").unwrap(),
            PathBuf::from("a\\b.txt")
        );
        assert_eq!(join_key("p", "a\\b.txt"), "p/a\\b.txt");
    }

    #[cfg(windows)]
    #[test]
    fn local_path_rejects_windows_reserved_characters() {
        assert!(local_relative_path("p/", "p/trace-12:30.json").is_err());
        assert!(local_relative_path("p/", "p/a\\b.txt").is_err());
    }

    #[test]
    fn basename() {
        assert_eq!(key_basename("a/b/c.zip"), "c.zip");
        assert_eq!(key_basename("a/b/"), "b");
        assert_eq!(key_basename("c"), "c");
    }

    #[test]
    fn run_id_rules() {
        assert!(validate_run_id("2024-06-01-123").is_ok());
        assert!(validate_run_id("").is_err());
        assert!(validate_run_id("a/b").is_err());
    }

    #[test]
    fn shard_key_parses_conventional_layout() {
        let key = ShardKey::parse("runs/R/blob/shard-12/report-abc.zip", "R").unwrap();
        assert_eq!(key.folder, "shard-12");
        assert_eq!(key.shard, 12);
        assert_eq!(key.rest, "report-abc.zip");

        let placeholder = ShardKey::parse("runs/R/blob/shard-3/", "R").unwrap();
        assert_eq!(placeholder.shard, 3);
        assert_eq!(placeholder.rest, "");
    }

    #[test]
    fn shard_key_rejects_malformed() {
        assert!(ShardKey::parse("runs/R/blob/shard-1", "R").is_err());
        assert!(ShardKey::parse("runs/R/blob/shard-x/a.zip", "R").is_err());
        assert!(ShardKey::parse("runs/R/blob/shard-/a.zip", "R").is_err());
        assert!(ShardKey::parse("runs/S/blob/shard-1/a.zip", "R").is_err());
    }
}
