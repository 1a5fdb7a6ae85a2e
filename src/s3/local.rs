use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::s3::store::{ObjectInfo, ObjectStore};

/// Stores objects on the local filesystem as `<root>/<bucket>/<key>`.
///
/// An empty directory inside a bucket lists as a placeholder key ending in "/".
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let dir = self.bucket_dir(bucket)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SyncError::io(dir, e))
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(SyncError::Config(format!("invalid bucket name {bucket:?}")));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let mut path = self.bucket_dir(bucket)?;
        let mut pushed = false;
        for segment in key.split('/') {
            match segment {
                "" => continue,
                "." | ".." => return Err(SyncError::malformed(key, "relative segment in key")),
                s => {
                    path.push(s);
                    pushed = true;
                }
            }
        }
        if !pushed {
            return Err(SyncError::malformed(key, "empty key"));
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(SyncError::transfer(
                "list",
                prefix,
                format!("bucket {bucket} does not exist under {}", self.root.display()),
            ));
        }
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<ObjectInfo>> {
            let mut objects = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1) {
                let entry = entry?;
                let rel = entry.path().strip_prefix(&dir).unwrap_or(entry.path());
                let mut key = crate::s3::prefix::relative_key(rel);
                let size = if entry.file_type().is_dir() {
                    let empty = std::fs::read_dir(entry.path())
                        .map_err(|e| SyncError::io(entry.path(), e))?
                        .next()
                        .is_none();
                    if !empty {
                        continue;
                    }
                    key.push('/');
                    0
                } else {
                    entry.metadata()?.len()
                };
                if key.starts_with(&prefix) {
                    objects.push(ObjectInfo { key, size });
                }
            }
            objects.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(objects)
        })
        .await?
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path, _content_type: &str) -> Result<()> {
        let dest = self.object_path(bucket, key)?;
        if key.ends_with('/') {
            return tokio::fs::create_dir_all(&dest)
                .await
                .map_err(|e| SyncError::io(dest, e));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }
        tokio::fs::copy(path, &dest)
            .await
            .map_err(|e| SyncError::transfer("upload", key, e))?;
        Ok(())
    }

    async fn get_to_file(&self, bucket: &str, key: &str, path: &Path) -> Result<u64> {
        let src = self.object_path(bucket, key)?;
        tokio::fs::copy(&src, path)
            .await
            .map_err(|e| SyncError::transfer("download", key, e))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let target = self.object_path(bucket, key)?;
        let removed = if key.ends_with('/') {
            tokio::fs::remove_dir(&target).await
        } else {
            tokio::fs::remove_file(&target).await
        };
        match removed {
            Ok(()) => {}
            // Matches S3 DeleteObject, which succeeds for absent keys.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SyncError::transfer("delete", key, e)),
        }

        // Parents only existed for this key; leaving them would list as placeholders.
        let bucket_dir = self.bucket_dir(bucket)?;
        let mut dir = target.parent();
        while let Some(d) = dir {
            if d == bucket_dir || tokio::fs::remove_dir(d).await.is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_list_get_delete() -> Result<()> {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());
        store.create_bucket("reports").await?;

        let src = root.path().join("src.json");
        std::fs::write(&src, b"{\"ok\":true}").unwrap();
        store
            .put_file("reports", "runs/1/blob/shard-1/a.json", &src, "application/json")
            .await?;

        let listed = store.list("reports", "runs/1/").await?;
        assert_eq!(
            listed,
            vec![ObjectInfo {
                key: "runs/1/blob/shard-1/a.json".into(),
                size: 11,
            }]
        );

        let out = root.path().join("out.json");
        let n = store.get_to_file("reports", "runs/1/blob/shard-1/a.json", &out).await?;
        assert_eq!(n, 11);
        assert_eq!(std::fs::read(&out).unwrap(), b"{\"ok\":true}");

        store.delete("reports", "runs/1/blob/shard-1/a.json").await?;
        let listed = store.list("reports", "runs/1/blob/shard-1/a").await?;
        assert!(listed.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn deleting_absent_key_succeeds() -> Result<()> {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());
        store.create_bucket("reports").await?;
        store.delete("reports", "runs/1/missing.json").await?;
        assert!(root.path().join("reports").is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn empty_directories_list_as_placeholders() -> Result<()> {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());
        store.create_bucket("b").await?;
        std::fs::create_dir_all(root.path().join("b/runs/1/blob/shard-4")).unwrap();

        let listed = store.list("b", "runs/1/blob/").await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "runs/1/blob/shard-4/");
        Ok(())
    }

    #[tokio::test]
    async fn missing_bucket_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());
        assert!(store.list("nope", "").await.is_err());
    }

    #[tokio::test]
    async fn keys_cannot_escape_bucket() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());
        let src = root.path().join("x");
        std::fs::write(&src, b"x").unwrap();
        let err = store.put_file("b", "../outside", &src, "text/plain").await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedKey { .. }));
    }
}
