use crate::errors::{GenerationError, PublishError, StorageError, TrendError};
use crate::models::{Artifact, GenerationParams, Prompt, TrendList};
use async_trait::async_trait;

/// Source of currently popular topics.
#[async_trait]
pub trait TrendSource: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Returns at most `limit` trend names for the location, in the order reported.
    async fn top_trends(&self, woeid: u64, limit: usize) -> Result<TrendList, TrendError>;
}

/// Text-to-image generation backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync + 'static {
    /// Issues a single generation request and returns every artifact in the response.
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<Vec<Artifact>, GenerationError>;
}

/// Trait defining operations for storing file data (generated images).
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    /// Bucket every upload goes to.
    fn bucket_name(&self) -> &str;

    /// Uploads file data to the storage backend, overwriting any existing object.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError>;
}

/// Social platform that accepts a status update with one attached image.
#[async_trait]
pub trait SocialPoster: Send + Sync + 'static {
    /// Publishes the post and returns the platform's id for it.
    async fn post_with_image(&self, message: &str, image_png: &[u8]) -> Result<String, PublishError>;
}
