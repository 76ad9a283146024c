//! Image storage over the `object_store` crate.
//!
//! One [`BlobStore`] implementation covers every backend; only the way a
//! stored key is turned into the reference kept on the order differs:
//!
//! - local disk and memory: the reference is the bare key, served by this
//!   service under `/uploads/{key}`
//! - S3 and Azure Blob Storage: the reference is `{public_base_url}/{key}`,
//!   and only references in that form resolve

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use uuid::Uuid;

use crate::config::{AzureSettings, S3Settings};
use crate::domain::errors::DomainError;
use crate::domain::ports::BlobStore;

const DEFAULT_NAME: &str = "image";

impl From<object_store::Error> for DomainError {
    fn from(e: object_store::Error) -> Self {
        DomainError::StorageUnavailable(e.to_string())
    }
}

pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    /// `None` for backends whose references are bare keys.
    public_base_url: Option<String>,
}

impl ObjectBlobStore {
    /// Store files under `root`, creating the directory if needed.
    pub fn local(root: &Path) -> Result<Self, DomainError> {
        std::fs::create_dir_all(root).map_err(|e| {
            DomainError::StorageUnavailable(format!(
                "cannot create upload directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            store: Arc::new(LocalFileSystem::new_with_prefix(root)?),
            public_base_url: None,
        })
    }

    pub fn s3(settings: &S3Settings) -> Result<Self, DomainError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region);

        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(access_key_id) = &settings.access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }
        if let Some(secret_access_key) = &settings.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key);
        }

        Ok(Self {
            store: Arc::new(builder.build()?),
            public_base_url: Some(settings.public_base_url.trim_end_matches('/').to_string()),
        })
    }

    pub fn azure(settings: &AzureSettings) -> Result<Self, DomainError> {
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_account(&settings.account)
            .with_container_name(&settings.container);

        if let Some(access_key) = &settings.access_key {
            builder = builder.with_access_key(access_key);
        }

        Ok(Self {
            store: Arc::new(builder.build()?),
            public_base_url: Some(settings.public_base_url.trim_end_matches('/').to_string()),
        })
    }

    pub fn in_memory() -> Self {
        Self::with_object_store(Arc::new(InMemory::new()), None)
    }

    pub fn with_object_store(store: Arc<dyn ObjectStore>, public_base_url: Option<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn reference_for(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => key.to_string(),
        }
    }

    /// Map a reference back to its storage key. Anything that does not look
    /// like a reference this store produced yields `None`; on remote
    /// backends that includes bare keys.
    fn key_for(&self, image_ref: &str) -> Option<ObjectPath> {
        let key = match &self.public_base_url {
            Some(base) => image_ref
                .strip_prefix(base.as_str())
                .and_then(|rest| rest.strip_prefix('/'))?,
            None => image_ref,
        };
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
            return None;
        }
        Some(ObjectPath::from(key))
    }
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`.
pub fn sanitize_name(original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim_start_matches('.');
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        cleaned
    }
}

fn new_key(original_name: Option<&str>) -> String {
    let name = original_name.map(sanitize_name).unwrap_or_else(|| DEFAULT_NAME.to_string());
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", Utc::now().timestamp_millis(), &nonce[..8], name)
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, original_name: Option<&str>, bytes: Bytes) -> Result<String, DomainError> {
        let key = new_key(original_name);
        self.store
            .put(&ObjectPath::from(key.as_str()), bytes.into())
            .await?;
        Ok(self.reference_for(&key))
    }

    async fn get(&self, image_ref: &str) -> Result<Option<Bytes>, DomainError> {
        let Some(path) = self.key_for(image_ref) else {
            return Ok(None);
        };
        match self.store.get(&path).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, image_ref: &str) -> Result<bool, DomainError> {
        let Some(path) = self.key_for(image_ref) else {
            return Ok(false);
        };
        // Some backends treat deleting a missing object as success.
        match self.store.head(&path).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(DomainError::BlobCleanupFailed(e.to_string())),
        }
        match self.store.delete(&path).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(DomainError::BlobCleanupFailed(e.to_string())),
        }
    }
}
