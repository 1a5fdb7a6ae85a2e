use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Moves test report blobs between local directories and a bucket.
#[derive(Debug, Parser)]
#[command(name = "blob-sync", version)]
pub struct Cli {
    /// Config file (TOML); defaults to the per-user blob-sync config.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum concurrent transfers per batch.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Upload a directory tree under a key prefix.
    Upload {
        bucket: String,
        source_dir: PathBuf,
        dest_prefix: String,
    },
    /// Download every object under a prefix into a directory.
    Download {
        bucket: String,
        prefix: String,
        dest_dir: PathBuf,
        /// Fail when no objects match the prefix.
        #[arg(long)]
        strict: bool,
        /// Write objects by file name only, dropping sub-paths.
        #[arg(long)]
        flatten: bool,
    },
    /// Print the number of distinct shard folders for a run.
    Count {
        bucket: String,
        run_id: String,
        /// Fail when any key does not fit runs/<runId>/blob/shard-<n>/.
        #[arg(long)]
        strict: bool,
    },
    /// Upload a single file to an exact key.
    UploadFile {
        bucket: String,
        file: PathBuf,
        dest_key: String,
    },
    /// Delete a single object.
    Delete { bucket: String, key: String },
    /// Download all shard blobs for $RUN_ID from $BUCKET and merge them.
    Merge,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Upload { .. } => "upload",
            Command::Download { .. } => "download",
            Command::Count { .. } => "count",
            Command::UploadFile { .. } => "upload-file",
            Command::Delete { .. } => "delete",
            Command::Merge => "merge",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("blob-sync").chain(args.iter().copied()))
    }

    #[test]
    fn parses_upload() {
        let cli = parse(&["upload", "reports", "blob-report", "runs/7/blob/shard-1"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Upload {
                bucket: "reports".into(),
                source_dir: PathBuf::from("blob-report"),
                dest_prefix: "runs/7/blob/shard-1".into(),
            }
        );
    }

    #[test]
    fn parses_download_flags() {
        let cli = parse(&["download", "reports", "runs/7/blob/", "out", "--strict"]).unwrap();
        match cli.command {
            Command::Download { strict, flatten, .. } => {
                assert!(strict);
                assert!(!flatten);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_count_and_globals() {
        let cli = parse(&["--concurrency", "4", "count", "reports", "7"]).unwrap();
        assert_eq!(cli.concurrency, Some(4));
        assert_eq!(cli.command.name(), "count");
    }

    #[test]
    fn parses_upload_file_and_delete() {
        let cli = parse(&["upload-file", "reports", "summary.json", "runs/7/summary.json"]).unwrap();
        assert_eq!(cli.command.name(), "upload-file");
        let cli = parse(&["delete", "reports", "runs/7/summary.json"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Delete {
                bucket: "reports".into(),
                key: "runs/7/summary.json".into(),
            }
        );
    }

    #[test]
    fn rejects_unknown_verb_and_missing_args() {
        assert!(parse(&["sync", "reports"]).is_err());
        assert!(parse(&["upload", "reports", "dir"]).is_err());
        assert!(parse(&[]).is_err());
    }
}
