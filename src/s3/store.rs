use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Information about an object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// The four bucket operations the sync utility needs.
///
/// Implementations authenticate however their backend does; callers only
/// see bucket names and keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object whose key starts with `prefix`, across all pages.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Upload a local file, overwriting any existing object at `key`.
    async fn put_file(&self, bucket: &str, key: &str, path: &Path, content_type: &str) -> Result<()>;

    /// Download an object into `path`. The parent directory must exist.
    async fn get_to_file(&self, bucket: &str, key: &str, path: &Path) -> Result<u64>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn ObjectStore>;
