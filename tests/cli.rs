//! Exit codes and output of the `blob-sync` binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const BUCKET: &str = "e2e-reports";

/// Temp dir holding a local-backend config and its bucket root.
fn workspace() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let buckets = dir.path().join("buckets");
    std::fs::create_dir_all(buckets.join(BUCKET)).unwrap();
    let config = dir.path().join("blob-sync.toml");
    std::fs::write(
        &config,
        format!("backend = \"local\"\nlocal_root = '{}'\n", buckets.display()),
    )
    .unwrap();
    (dir, config)
}

fn put(dir: &Path, key: &str) {
    let path = dir.join("buckets").join(BUCKET).join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "PK").unwrap();
}

fn blob_sync(config: Option<&Path>, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_blob-sync"));
    if let Some(config) = config {
        cmd.arg("--config").arg(config);
    }
    for var in [
        "BLOB_SYNC_BACKEND",
        "BLOB_SYNC_LOCAL_ROOT",
        "BLOB_SYNC_REGION",
        "BLOB_SYNC_ENDPOINT",
        "BLOB_SYNC_CONCURRENCY",
        "BUCKET",
        "RUN_ID",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "off").args(args).output().unwrap()
}

#[test]
fn help_exits_zero() {
    let out = blob_sync(None, &["--help"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("count"));
}

#[test]
fn unknown_verb_exits_one() {
    let out = blob_sync(None, &["sync", BUCKET]);
    assert_eq!(out.status.code(), Some(1));
    assert!(!out.stderr.is_empty());
}

#[test]
fn count_prints_shard_total() {
    let (dir, config) = workspace();
    put(dir.path(), "runs/R/blob/shard-1/report-1.zip");
    put(dir.path(), "runs/R/blob/shard-2/report-2.zip");

    let out = blob_sync(Some(&config), &["count", BUCKET, "R"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "2\n");
}

#[test]
fn failed_upload_exits_one_with_message() {
    let (dir, config) = workspace();
    let missing = dir.path().join("no-such-dir");

    let out = blob_sync(
        Some(&config),
        &["upload", BUCKET, missing.to_str().unwrap(), "runs/R/blob/shard-1"],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Error:"));
}

#[test]
fn merge_without_env_exits_one() {
    let (_dir, config) = workspace();
    let out = blob_sync(Some(&config), &["merge"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("BUCKET and RUN_ID"));
}
