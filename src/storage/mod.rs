//! Object storage for uploaded files.
//!
//! Files live at deterministic per-entity paths so a re-upload for the same
//! entity and field overwrites rather than accumulates.

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;
use uuid::Uuid;

pub mod object_storage;

pub use object_storage::ObjectStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),

    #[error("Storage rejected {path} ({status}): {message}")]
    Rejected {
        path: String,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// A file part received with a create or update request
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }
}

/// Contract of the file store. Implementations must be safe to share across
/// requests.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn upload(&self, path: &str, content: Bytes, content_type: &str, upsert: bool) -> Result<(), StorageError>;

    /// Publicly reachable location of a stored object
    fn public_url(&self, path: &str) -> String;

    /// Inverse of `public_url`; `None` for locations this store does not own
    fn path_from_url(&self, url: &str) -> Option<String>;

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError>;
}

/// `{collection}/{id}/{field}_{index}.{ext}`, extension taken from the
/// client's file name
pub fn object_path(collection: &str, id: Uuid, field: &str, index: usize, file_name: &str) -> String {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}/{}/{}_{}.{}", collection, id, field, index, ext),
        None => format!("{}/{}/{}_{}", collection, id, field, index),
    }
}
