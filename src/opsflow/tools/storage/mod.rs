// SPDX-License-Identifier: MIT

//! Object storage uploads
//!
//! The coordinator builds a typed [`StorageCommand`]; the JSON form
//! `{"action": "upload_to_s3", "params": {...}}` is still accepted through
//! the [`Tool`] interface and validated on parse.

mod s3;
pub mod sigv4;

pub use s3::S3Store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::kit::{Result, StorageError, Tool};

/// Validated upload request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UploadParams", into = "UploadParams")]
pub struct Upload {
    bucket: String,
    key: String,
    content: String,
}

impl Upload {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Wire shape of the upload params, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadParams {
    bucket_name: String,
    file_name: String,
    content: String,
}

impl TryFrom<UploadParams> for Upload {
    type Error = StorageError;

    fn try_from(params: UploadParams) -> std::result::Result<Self, Self::Error> {
        if params.bucket_name.trim().is_empty() {
            return Err(StorageError::MissingBucket);
        }
        if params.file_name.trim().is_empty() {
            return Err(StorageError::MissingKey);
        }
        Ok(Self {
            bucket: params.bucket_name,
            key: params.file_name,
            content: params.content,
        })
    }
}

impl From<Upload> for UploadParams {
    fn from(upload: Upload) -> Self {
        Self {
            bucket_name: upload.bucket,
            file_name: upload.key,
            content: upload.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params")]
pub enum StorageCommand {
    #[serde(rename = "upload_to_s3")]
    UploadToS3(Upload),
}

impl StorageCommand {
    pub fn upload_to_s3(
        bucket: impl Into<String>,
        key: impl Into<String>,
        content: impl Into<String>,
    ) -> std::result::Result<Self, StorageError> {
        let upload = Upload::try_from(UploadParams {
            bucket_name: bucket.into(),
            file_name: key.into(),
            content: content.into(),
        })?;
        Ok(Self::UploadToS3(upload))
    }

    /// Parse the JSON command form
    pub fn parse(command: &str) -> std::result::Result<Self, StorageError> {
        serde_json::from_str(command).map_err(|e| StorageError::InvalidCommand(e.to_string()))
    }
}

/// Backend that stores raw objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn backend(&self) -> &str;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// Stores objects under `<root>/<bucket>/<key>`
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> std::result::Result<PathBuf, StorageError> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StorageError::InvalidCommand(format!(
                "Object path escapes store root: {}",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    fn backend(&self) -> &str {
        "filesystem"
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        log::debug!("Stored object at {}", path.display());
        Ok(())
    }
}

/// Executes storage commands against an object store
pub struct ObjectStorageTool {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStorageTool {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, command: &StorageCommand) -> Result<String> {
        match command {
            StorageCommand::UploadToS3(upload) => {
                self.store
                    .put_object(
                        upload.bucket(),
                        upload.key(),
                        upload.content().as_bytes().to_vec(),
                    )
                    .await?;
                log::info!(
                    "Uploaded {} to {} bucket {}",
                    upload.key(),
                    self.store.backend(),
                    upload.bucket()
                );
                Ok("File uploaded successfully".to_string())
            }
        }
    }
}

#[async_trait]
impl Tool for ObjectStorageTool {
    fn name(&self) -> &str {
        "object_storage"
    }

    fn description(&self) -> &str {
        "Uploads report content to object storage."
    }

    async fn run(&self, command: &str) -> Result<String> {
        let command = StorageCommand::parse(command)?;
        self.execute(&command).await
    }
}
