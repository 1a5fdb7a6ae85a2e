//! Moves sharded test report blobs between local directories and a bucket.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod s3;
pub mod utils;

pub use error::{Result, SyncError};
pub use s3::{
    BlobSync, DownloadLayout, DownloadOptions, EmptyPolicy, LocalStore, ObjectInfo, ObjectStore,
    S3Store, ShardCount, SharedStore, TransferSummary,
};
