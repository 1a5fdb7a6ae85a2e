use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{Result, SyncError};
use crate::s3::store::{ObjectInfo, ObjectStore};

/// Creates an S3 client from ambient credentials.
///
/// Region and endpoint come from the config when set, otherwise from the
/// standard AWS environment chain. Path-style addressing is needed for
/// MinIO and similar endpoints.
pub async fn create_s3_client(config: &AppConfig) -> Client {
    let mut loader = aws_config::from_env();
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .build();
    Client::from_conf(s3_config)
}

/// `ObjectStore` over the AWS SDK.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| SyncError::transfer("list", prefix, aws_sdk_s3::Error::from(e)))?;
            for obj in page.contents() {
                if let Some(key) = obj.key() {
                    objects.push(ObjectInfo {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }
        }
        debug!("Listed {} objects under s3://{}/{}", objects.len(), bucket, prefix);
        Ok(objects)
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let stream = ByteStream::from_path(path)
            .await
            .map_err(|e| SyncError::transfer("read", path.display().to_string(), e))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .cache_control("no-cache")
            .body(stream)
            .send()
            .await
            .map_err(|e| SyncError::transfer("upload", key, aws_sdk_s3::Error::from(e)))?;
        Ok(())
    }

    async fn get_to_file(&self, bucket: &str, key: &str, path: &Path) -> Result<u64> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SyncError::transfer("download", key, aws_sdk_s3::Error::from(e)))?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        let mut body = resp.body;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| SyncError::transfer("download", key, e))?
        {
            file.write_all(&chunk).await.map_err(|e| SyncError::io(path, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| SyncError::io(path, e))?;
        Ok(written)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SyncError::transfer("delete", key, aws_sdk_s3::Error::from(e)))?;
        Ok(())
    }
}
