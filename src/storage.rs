use crate::{
    domain::FileStorage,
    errors::StorageError,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    error::SdkError,
    primitives::ByteStream,
    Client as S3Client,
};
use tracing;

/// Public URL of an object in a bucket. Built from the template only;
/// whether the object is actually readable depends on the bucket policy.
pub fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{}.s3.amazonaws.com/{}", bucket, key)
}

#[derive(Debug, Clone)]
pub struct S3FileStorage {
    client: S3Client,
    bucket_name: String,
}

impl S3FileStorage {
    pub fn new(client: S3Client, bucket_name: String) -> Self {
        tracing::info!(bucket = %bucket_name, "Initializing S3FileStorage");
        Self { client, bucket_name }
    }
}

#[async_trait]
impl FileStorage for S3FileStorage {
    fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Uploads data to S3 using PutObject. Sets Content-Type.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError> {
        let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, %content_type, bytes = data.len(), "S3: Uploading file");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|sdk_err| {
                // Service errors (AccessDenied, NoSuchBucket, ...) carry an error code worth surfacing
                if let SdkError::ServiceError(service_err) = &sdk_err {
                    let code = service_err.err().meta().code().unwrap_or("Unknown");
                    return StorageError::UploadFailed(format!("{} (key '{}')", code, key));
                }
                StorageError::BackendError(
                    anyhow::Error::new(sdk_err).context(format!("S3: Failed to upload object with key '{}'", key)),
                )
            })?;

        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Upload successful");
        Ok(())
    }
}
