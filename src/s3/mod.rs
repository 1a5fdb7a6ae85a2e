pub mod client;
pub mod local;
pub mod prefix;
pub mod store;
pub mod sync;

pub use client::{S3Store, create_s3_client};
pub use local::LocalStore;
pub use prefix::ShardKey;
pub use store::{ObjectInfo, ObjectStore, SharedStore};
pub use sync::{
    BlobSync, DownloadLayout, DownloadOptions, EmptyPolicy, ShardCount, TransferSummary,
};
