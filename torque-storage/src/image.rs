use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::ObjectStore;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Storage section of the application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// "simulated", "s3" or "minio"
    pub backend: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Capability interface for maintenance images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Decodes the base64 payload and uploads it under a key derived from
    /// the order's request id. Returns the public URL of the object.
    async fn upload_image(
        &self,
        image_base64: &str,
        request_id: &str,
        content_type: &str,
    ) -> StorageResult<String>;

    async fn delete_image(&self, key: &str) -> StorageResult<()>;

    /// Temporary access URL for an already uploaded object.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

/// Builds the image store selected by configuration. Called once at
/// process startup.
pub fn image_store_from_settings(
    settings: &StorageSettings,
) -> StorageResult<Arc<dyn ImageStore>> {
    match settings.backend.as_str() {
        "simulated" => Ok(Arc::new(SimulatedImageStore::new(
            &settings.bucket,
            &settings.region,
        ))),
        "s3" | "minio" => Ok(Arc::new(S3ImageStore::new(settings)?)),
        other => Err(StorageError::Config(format!(
            "unsupported storage backend: {}",
            other
        ))),
    }
}

fn decode_payload(image_base64: &str) -> StorageResult<Bytes> {
    let data = general_purpose::STANDARD
        .decode(image_base64.trim())
        .map_err(|e| StorageError::InvalidInput(format!("invalid base64 image data: {}", e)))?;
    if data.is_empty() {
        return Err(StorageError::InvalidInput(
            "image payload is empty".to_string(),
        ));
    }
    Ok(Bytes::from(data))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Key layout: maintenance-images/{request_id}/{timestamp}_{short-id}.{ext}
fn object_key(request_id: &str, content_type: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    format!(
        "maintenance-images/{}/{}_{}.{}",
        request_id,
        timestamp,
        &unique[..8],
        extension_for(content_type)
    )
}

fn bucket_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

// ============================================================================
// Simulated store
// ============================================================================

/// In-memory store for development and tests. Objects live in an
/// `object_store::memory::InMemory` instance; URLs point at the configured
/// bucket even though nothing ever leaves the process.
pub struct SimulatedImageStore {
    store: InMemory,
    bucket: String,
    region: String,
}

impl SimulatedImageStore {
    pub fn new(bucket: &str, region: &str) -> Self {
        Self {
            store: InMemory::new(),
            bucket: bucket.to_string(),
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl ImageStore for SimulatedImageStore {
    async fn upload_image(
        &self,
        image_base64: &str,
        request_id: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let data = decode_payload(image_base64)?;
        let key = object_key(request_id, content_type);
        let size = data.len();

        self.store
            .put(&ObjectPath::from(key.clone()), data.into())
            .await?;

        tracing::info!(key = %key, bytes = size, "[storage simulation] uploaded image");
        Ok(bucket_url(&self.bucket, &self.region, &key))
    }

    async fn delete_image(&self, key: &str) -> StorageResult<()> {
        self.store.delete(&ObjectPath::from(key)).await?;
        tracing::info!(key = %key, "[storage simulation] deleted image");
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!(
            "{}?X-Amz-Expires={}",
            bucket_url(&self.bucket, &self.region, key),
            expires_in.as_secs()
        ))
    }
}

// ============================================================================
// S3-compatible store
// ============================================================================

/// Network-backed store for S3 or any S3-compatible endpoint (MinIO).
pub struct S3ImageStore {
    s3: AmazonS3,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3ImageStore {
    pub fn new(settings: &StorageSettings) -> StorageResult<Self> {
        if settings.bucket.is_empty() {
            return Err(StorageError::Config("bucket is required".to_string()));
        }
        if settings.backend == "minio" && settings.endpoint.is_none() {
            return Err(StorageError::Config(
                "endpoint is required for the minio backend".to_string(),
            ));
        }

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region);

        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(settings.allow_http);
        }
        if let Some(access_key_id) = &settings.access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }
        if let Some(secret_access_key) = &settings.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key);
        }

        let s3 = builder
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build S3 store: {}", e)))?;

        Ok(Self {
            s3,
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => bucket_url(&self.bucket, &self.region, key),
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn upload_image(
        &self,
        image_base64: &str,
        request_id: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let data = decode_payload(image_base64)?;
        let key = object_key(request_id, content_type);
        let size = data.len();

        self.s3
            .put(&ObjectPath::from(key.clone()), data.into())
            .await
            .map_err(|e| StorageError::Upload(format!("failed to upload {}: {}", key, e)))?;

        tracing::info!(key = %key, bytes = size, "uploaded image");
        Ok(self.public_url(&key))
    }

    async fn delete_image(&self, key: &str) -> StorageResult<()> {
        self.s3.delete(&ObjectPath::from(key)).await?;
        tracing::info!(key = %key, "deleted image");
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let url = self
            .s3
            .signed_url(http::Method::GET, &ObjectPath::from(key), expires_in)
            .await?;
        Ok(url.to_string())
    }
}
