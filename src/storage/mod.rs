//! Object storage for uploaded documents and backup artifacts.
//!
//! One `Storage` value is shared by the whole app. Writes go to the primary
//! store (S3 when configured, the local disk otherwise). Locations prefixed
//! with `local:` always resolve to the local disk, which keeps older uploads
//! that were written to the server deletable after S3 is switched on.

mod local;
mod s3;

pub use local::LocalStore;
pub use s3::{S3Store, signing_key, uri_encode};

use crate::config::Config;
use crate::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub const LOCAL_PREFIX: &str = "local:";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object {key} not found")),
            StorageError::InvalidKey(key) => AppError::BadRequest(format!("Invalid object key {key}")),
            other => AppError::Storage(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Rejects keys that could escape the bucket or the storage root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Storage {
    primary: Arc<dyn ObjectStore>,
    local: LocalStore,
    primary_is_local: bool,
}

impl Storage {
    pub fn new(primary: Arc<dyn ObjectStore>, local: LocalStore, primary_is_local: bool) -> Self {
        Self {
            primary,
            local,
            primary_is_local,
        }
    }

    pub fn local_only(local: LocalStore) -> Self {
        Self {
            primary: Arc::new(local.clone()),
            local,
            primary_is_local: true,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let local = LocalStore::new(&config.local_storage_root);
        match config.s3_settings() {
            Some(settings) => {
                let s3 = S3Store::new(settings)?;
                tracing::info!(bucket = %s3.bucket(), "Using S3 object storage");
                Ok(Self::new(Arc::new(s3), local, false))
            }
            None => {
                tracing::warn!(
                    root = %config.local_storage_root,
                    "S3 not configured, storing objects on local disk"
                );
                Ok(Self::local_only(local))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Stores `body` under `key` and returns the location to persist.
    pub async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        self.primary.put(key, body, content_type).await?;
        Ok(if self.primary_is_local {
            format!("{LOCAL_PREFIX}{key}")
        } else {
            key.to_string()
        })
    }

    pub async fn get(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        match location.strip_prefix(LOCAL_PREFIX) {
            Some(path) => self.local.get(path).await,
            None => self.primary.get(location).await,
        }
    }

    pub async fn delete(&self, location: &str) -> Result<(), StorageError> {
        match location.strip_prefix(LOCAL_PREFIX) {
            Some(path) => self.local.delete(path).await,
            None => self.primary.delete(location).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_cannot_escape_the_root() {
        assert!(validate_key("documents/employee/1/a.pdf").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn storage_errors_map_to_client_errors() {
        let err: AppError = StorageError::NotFound("x".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));
        let err: AppError = StorageError::Http("503".into()).into();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
