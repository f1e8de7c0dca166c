use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{header, RequestBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{StorageClient, StorageError};
use crate::config::StorageConfig;

/// Bucket-based object store reached over HTTP (`/storage/v1/object/...`)
pub struct ObjectStorage {
    http: reqwest::Client,
    base: Url,
    bucket: String,
    api_key: String,
}

impl ObjectStorage {
    pub fn new(config: &StorageConfig, timeout_secs: u64) -> Result<Self, StorageError> {
        if config.url.trim().is_empty() {
            return Err(StorageError::ConfigMissing("STORAGE_URL"));
        }
        if config.bucket.trim().is_empty() {
            return Err(StorageError::ConfigMissing("STORAGE_BUCKET"));
        }

        let mut base = Url::parse(&config.url).map_err(|_| StorageError::InvalidUrl(config.url.clone()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let base = base
            .join("storage/v1/")
            .map_err(|_| StorageError::InvalidUrl(config.url.clone()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base,
            bucket: config.bucket.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}object/{}/{}", self.base, self.bucket, path)
    }

    fn public_prefix(&self) -> String {
        format!("{}object/public/{}/", self.base, self.bucket)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.header("apikey", &self.api_key).bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl StorageClient for ObjectStorage {
    async fn upload(&self, path: &str, content: Bytes, content_type: &str, upsert: bool) -> Result<(), StorageError> {
        debug!("Uploading {} ({} bytes, {})", path, content.len(), content_type);
        let request = self
            .http
            .post(self.object_url(path))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(content);

        let response = self.authorize(request).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                path: path.to_string(),
                status,
                message,
            });
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.public_prefix(), path)
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_prefix())
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        if paths.is_empty() {
            return Ok(());
        }
        debug!("Removing {:?}", paths);
        let request = self
            .http
            .delete(format!("{}object/{}", self.base, self.bucket))
            .json(&json!({ "prefixes": paths }));

        let response = self.authorize(request).send().await?;
        // A missing object is already in the desired state
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                path: paths.join(","),
                status,
                message,
            });
        }
        Ok(())
    }
}
