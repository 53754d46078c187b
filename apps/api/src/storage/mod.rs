//! Object storage for rendered CVs.
//!
//! `S3Storage` targets S3 or MinIO. `MemoryStorage` keeps PDFs in process and is
//! used when no bucket is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::S3Config;
use crate::errors::AppError;

/// Storage key for a job's PDF.
pub fn cv_key(user_id: Uuid, job_id: Uuid) -> String {
    format!("cvs/{user_id}/{job_id}.pdf")
}

#[async_trait]
pub trait CvStorage: Send + Sync {
    async fn put(&self, key: &str, pdf: Bytes) -> Result<(), AppError>;
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    fn backend(&self) -> &'static str;
}

pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    /// Constructs an S3 client configured for MinIO (local) or AWS (production).
    pub async fn connect(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "borg-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl CvStorage for S3Storage {
    async fn put(&self, key: &str, pdf: Bytes) -> Result<(), AppError> {
        let size = pdf.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/pdf")
            .body(ByteStream::from(pdf))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        info!("Uploaded CV to s3://{}/{} ({} bytes)", self.bucket, key, size);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    return Ok(None);
                }
                return Err(AppError::Storage(format!("S3 download failed: {e}")));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 body read failed: {e}")))?;
        Ok(Some(data.into_bytes()))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed: {e}")))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CvStorage for MemoryStorage {
    async fn put(&self, key: &str, pdf: Bytes) -> Result<(), AppError> {
        self.objects.write().await.insert(key.to_string(), pdf);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
