use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::s3::prefix::{
    ShardKey, is_placeholder, join_key, key_basename, local_relative_path, relative_key,
    shard_listing_prefix, validate_run_id,
};
use crate::s3::store::SharedStore;
use crate::utils::{get_mime_type, human_bytes};

pub const DEFAULT_CONCURRENCY: usize = 16;

/// What a download does when the prefix has no objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// Nothing to do; no local files are created.
    #[default]
    Lenient,
    /// Zero objects is an `EmptyListing` error.
    Strict,
}

/// How object keys map onto the destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadLayout {
    /// Keep the sub-path below the prefix.
    #[default]
    Preserve,
    /// Keep only the key's last segment.
    Flatten,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    pub empty: EmptyPolicy,
    pub layout: DownloadLayout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub objects: usize,
    pub bytes: u64,
}

impl TransferSummary {
    fn record(&mut self, bytes: u64) {
        self.objects += 1;
        self.bytes += bytes;
    }
}

/// Distinct shard folders found under a run, plus keys that did not parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardCount {
    pub shards: BTreeSet<String>,
    pub malformed: Vec<String>,
}

impl ShardCount {
    pub fn count(&self) -> usize {
        self.shards.len()
    }
}

struct UploadJob {
    path: PathBuf,
    key: String,
    size: u64,
}

struct DownloadJob {
    key: String,
    path: PathBuf,
}

/// Batch transfers against one object store.
///
/// Holds the store handle and the transfer limits; every operation takes the
/// bucket explicitly so one instance can serve several buckets.
#[derive(Clone)]
pub struct BlobSync {
    store: SharedStore,
    concurrency: usize,
    exclude: Vec<glob::Pattern>,
}

impl BlobSync {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            concurrency: DEFAULT_CONCURRENCY,
            exclude: Vec::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Globs matched against upload paths relative to the source root.
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| SyncError::Pattern {
                    pattern: p.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Uploads every regular file under `source` to `dest_prefix/<relative path>`.
    ///
    /// The first failed upload aborts the batch.
    pub async fn upload_dir(
        &self,
        bucket: &str,
        source: &Path,
        dest_prefix: &str,
    ) -> Result<TransferSummary> {
        let jobs = collect_upload_jobs(source, dest_prefix, &self.exclude).await?;
        if jobs.is_empty() {
            info!("No files to upload under {}", source.display());
            return Ok(TransferSummary::default());
        }
        info!(
            "Uploading {} files from {} to {}/{}",
            jobs.len(),
            source.display(),
            bucket,
            dest_prefix
        );

        let bucket: Arc<str> = Arc::from(bucket);
        let summary = self
            .run_batch(jobs, |job| job.key.clone(), move |store, job: UploadJob| {
                let bucket = Arc::clone(&bucket);
                async move {
                    debug!("Map local file: {:?} -> key: {}", job.path, job.key);
                    store
                        .put_file(&bucket, &job.key, &job.path, get_mime_type(&job.path))
                        .await?;
                    info!("Uploaded: {}", job.key);
                    Ok::<u64, SyncError>(job.size)
                }
            })
            .await?;
        info!(
            "Upload complete: {} objects, {}",
            summary.objects,
            human_bytes(summary.bytes)
        );
        Ok(summary)
    }

    /// Uploads one file to an exact key.
    pub async fn upload_file(&self, bucket: &str, file: &Path, key: &str) -> Result<TransferSummary> {
        let meta = tokio::fs::metadata(file)
            .await
            .map_err(|e| SyncError::io(file, e))?;
        if !meta.is_file() {
            return Err(SyncError::io(
                file,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        self.store
            .put_file(bucket, key, file, get_mime_type(file))
            .await?;
        info!("Uploaded: {}", key);
        Ok(TransferSummary {
            objects: 1,
            bytes: meta.len(),
        })
    }

    pub async fn delete_file(&self, bucket: &str, key: &str) -> Result<()> {
        self.store.delete(bucket, key).await?;
        info!("Deleted: {}", key);
        Ok(())
    }

    /// Downloads every non-placeholder object under `prefix` into `dest`.
    pub async fn download_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        dest: &Path,
        options: DownloadOptions,
    ) -> Result<TransferSummary> {
        let listed = self.store.list(bucket, prefix).await?;
        let keys: Vec<String> = listed
            .into_iter()
            .map(|o| o.key)
            .filter(|k| !is_placeholder(k))
            .collect();

        if keys.is_empty() {
            return match options.empty {
                EmptyPolicy::Strict => Err(SyncError::EmptyListing {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                }),
                EmptyPolicy::Lenient => {
                    info!("No objects under {}/{}", bucket, prefix);
                    Ok(TransferSummary::default())
                }
            };
        }

        let jobs = plan_downloads(prefix, keys, dest, options.layout)?;
        info!(
            "Downloading {} objects from {}/{} to {}",
            jobs.len(),
            bucket,
            prefix,
            dest.display()
        );

        let bucket: Arc<str> = Arc::from(bucket);
        let summary = self
            .run_batch(jobs, |job| job.key.clone(), move |store, job: DownloadJob| {
                let bucket = Arc::clone(&bucket);
                async move {
                    if let Some(parent) = job.path.parent() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .map_err(|e| SyncError::io(parent, e))?;
                    }
                    let bytes = store.get_to_file(&bucket, &job.key, &job.path).await?;
                    info!("Downloaded: {}", job.key);
                    Ok::<u64, SyncError>(bytes)
                }
            })
            .await?;
        info!(
            "Download complete: {} objects, {}",
            summary.objects,
            human_bytes(summary.bytes)
        );
        Ok(summary)
    }

    /// Counts the distinct `shard-<n>` folders under `runs/<run_id>/blob/`.
    ///
    /// Keys that do not fit the layout are logged and returned in
    /// `malformed` instead of being counted.
    pub async fn count_shard_folders(&self, bucket: &str, run_id: &str) -> Result<ShardCount> {
        validate_run_id(run_id)?;
        let prefix = shard_listing_prefix(run_id);
        let objects = self.store.list(bucket, &prefix).await?;

        let mut count = ShardCount::default();
        for object in objects {
            match ShardKey::parse(&object.key, run_id) {
                Ok(shard) => {
                    count.shards.insert(shard.folder.to_string());
                }
                Err(e) => {
                    warn!("Skipping key outside the shard layout: {}", e);
                    count.malformed.push(object.key);
                }
            }
        }
        debug!("Shards for run {}: {:?}", run_id, count.shards);
        Ok(count)
    }

    /// Runs `op` for every job with at most `concurrency` in flight.
    ///
    /// Returns on the first failure; dropping the `JoinSet` aborts whatever
    /// is still running.
    async fn run_batch<J, L, F, Fut>(&self, jobs: Vec<J>, label: L, op: F) -> Result<TransferSummary>
    where
        J: Send + 'static,
        L: Fn(&J) -> String,
        F: Fn(SharedStore, J) -> Fut,
        Fut: Future<Output = Result<u64>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        let mut summary = TransferSummary::default();

        for job in jobs {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| SyncError::transfer("schedule", label(&job), e))?;
            while let Some(joined) = set.try_join_next() {
                summary.record(joined??);
            }
            let fut = op(Arc::clone(&self.store), job);
            set.spawn(async move {
                let _permit = permit;
                fut.await
            });
        }

        while let Some(joined) = set.join_next().await {
            summary.record(joined??);
        }
        Ok(summary)
    }
}

/// Walks `source` (following symlinks) and maps each file to its key.
async fn collect_upload_jobs(
    source: &Path,
    dest_prefix: &str,
    exclude: &[glob::Pattern],
) -> Result<Vec<UploadJob>> {
    let meta = tokio::fs::metadata(source)
        .await
        .map_err(|e| SyncError::io(source, e))?;
    if !meta.is_dir() {
        return Err(SyncError::io(
            source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let source = source.to_path_buf();
    let dest_prefix = dest_prefix.to_string();
    let exclude = exclude.to_vec();
    tokio::task::spawn_blocking(move || -> Result<Vec<UploadJob>> {
        let mut jobs = Vec::new();
        for entry in WalkDir::new(&source).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&source).unwrap_or(entry.path());
            let rel_key = relative_key(rel);
            if is_excluded(rel, &rel_key, &exclude) {
                debug!("Excluded from upload: {}", rel_key);
                continue;
            }
            jobs.push(UploadJob {
                path: entry.path().to_path_buf(),
                key: join_key(&dest_prefix, &rel_key),
                size: entry.metadata()?.len(),
            });
        }
        Ok(jobs)
    })
    .await?
}

fn is_excluded(rel: &Path, rel_key: &str, exclude: &[glob::Pattern]) -> bool {
    exclude.iter().any(|pattern| {
        pattern.matches(rel_key)
            || rel
                .components()
                .any(|c| pattern.matches(&c.as_os_str().to_string_lossy()))
    })
}

/// Resolves every key to a local path before any transfer starts, so a bad
/// key or a collision fails the batch without touching the filesystem.
fn plan_downloads(
    prefix: &str,
    keys: Vec<String>,
    dest: &Path,
    layout: DownloadLayout,
) -> Result<Vec<DownloadJob>> {
    let mut seen: HashMap<PathBuf, String> = HashMap::new();
    let mut jobs = Vec::with_capacity(keys.len());
    for key in keys {
        let rel = match layout {
            DownloadLayout::Preserve => local_relative_path(prefix, &key)?,
            DownloadLayout::Flatten => local_relative_path("", key_basename(&key))
                .map_err(|_| SyncError::malformed(&key, "key has no usable file name"))?,
        };
        let path = dest.join(rel);
        if let Some(other) = seen.get(&path) {
            return Err(SyncError::malformed(
                &key,
                format!("writes to the same file as {other}"),
            ));
        }
        seen.insert(path.clone(), key.clone());
        jobs.push(DownloadJob { key, path });
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_preserves_sub_paths() {
        let jobs = plan_downloads(
            "runs/1/blob/",
            vec!["runs/1/blob/shard-1/a.zip".into(), "runs/1/blob/shard-2/a.zip".into()],
            Path::new("/out"),
            DownloadLayout::Preserve,
        )
        .unwrap();
        assert_eq!(jobs[0].path, Path::new("/out/shard-1/a.zip"));
        assert_eq!(jobs[1].path, Path::new("/out/shard-2/a.zip"));
    }

    #[test]
    fn plan_flatten_detects_collisions() {
        let err = plan_downloads(
            "runs/1/blob/",
            vec!["runs/1/blob/shard-1/a.zip".into(), "runs/1/blob/shard-2/a.zip".into()],
            Path::new("/out"),
            DownloadLayout::Flatten,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("same file"));
    }

    #[test]
    fn plan_flatten_uses_basenames() {
        let jobs = plan_downloads(
            "runs/1/blob/",
            vec!["runs/1/blob/shard-1/report-a.zip".into(), "runs/1/blob/shard-2/report-b.zip".into()],
            Path::new("/out"),
            DownloadLayout::Flatten,
        )
        .unwrap();
        assert_eq!(jobs[0].path, Path::new("/out/report-a.zip"));
        assert_eq!(jobs[1].path, Path::new("/out/report-b.zip"));
    }

    #[test]
    fn exclude_matches_components_and_paths() {
        let patterns = vec![
            glob::Pattern::new("*.log").unwrap(),
            glob::Pattern::new("node_modules").unwrap(),
        ];
        let check = |p: &str| is_excluded(Path::new(p), p, &patterns);
        assert!(check("trace/run.log"));
        assert!(check("node_modules/x/index.js"));
        assert!(!check("report.zip"));
    }
}
