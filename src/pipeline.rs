use crate::{
    domain::{FileStorage, ImageGenerator, SocialPoster, TrendSource},
    errors::{CycleError, GenerationError, TrendError},
    imaging::reencode_png,
    keys::{Clock, ObjectKeyGenerator, SystemClock},
    models::{ArtifactKind, CycleContext, CycleOutcome, GenerationParams, PostMessage, Prompt, StorageReference, TrendList},
    scheduler::Job,
    storage::public_url,
};
use async_trait::async_trait;
use std::error::Error as _;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Yahoo WOEID for worldwide trends.
pub const WORLDWIDE_WOEID: u64 = 1;
pub const TOP_TRENDS: usize = 5;

pub async fn fetch_trends(source: &dyn TrendSource) -> Result<TrendList, TrendError> {
    let trends = source.top_trends(WORLDWIDE_WOEID, TOP_TRENDS).await?;
    if trends.is_empty() {
        return Err(TrendError::Empty(WORLDWIDE_WOEID));
    }
    Ok(trends)
}

/// Generates an image for the prompt and returns it as PNG.
/// `Ok(None)` means the response held no image artifact.
pub async fn synthesize_image(
    generator: &dyn ImageGenerator,
    prompt: &Prompt,
) -> Result<Option<Vec<u8>>, GenerationError> {
    let artifacts = generator.generate(prompt, &GenerationParams::default()).await?;
    let Some(artifact) = artifacts.into_iter().find(|a| a.kind == ArtifactKind::Image) else {
        tracing::warn!("No image artifact in generation response");
        return Ok(None);
    };
    tracing::debug!(seed = ?artifact.seed, bytes = artifact.bytes.len(), "Re-encoding generated image as PNG");
    reencode_png(&artifact.bytes).map(Some)
}

/// Uploads the image and returns its public reference.
/// Upload failures are logged and turned into `None`.
pub async fn store_image(storage: &dyn FileStorage, image_png: Vec<u8>, key: &str) -> Option<StorageReference> {
    let content_type = mime_guess::from_path(key).first_or_octet_stream().to_string();
    let bucket = storage.bucket_name().to_string();

    match storage.upload(key, image_png, Some(content_type)).await {
        Ok(()) => {
            let url = public_url(&bucket, key);
            tracing::info!(%bucket, s3_key = %key, %url, "Image stored");
            Some(StorageReference {
                bucket,
                key: key.to_string(),
                url,
            })
        }
        Err(e) => {
            tracing::error!(%bucket, s3_key = %key, error = %e, "Failed to store image");
            None
        }
    }
}

/// Posts the message with the image attached. Failures are logged and turned into `None`.
pub async fn publish_post(poster: &dyn SocialPoster, message: &PostMessage, image_png: &[u8]) -> Option<String> {
    match poster.post_with_image(message.as_str(), image_png).await {
        Ok(post_id) => Some(post_id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to publish post");
            None
        }
    }
}

/// The collaborators one cycle runs against.
pub struct Pipeline<C: Clock = SystemClock> {
    trends: Arc<dyn TrendSource>,
    generator: Arc<dyn ImageGenerator>,
    storage: Arc<dyn FileStorage>,
    poster: Arc<dyn SocialPoster>,
    keys: ObjectKeyGenerator<C>,
}

impl<C: Clock> Pipeline<C> {
    pub fn new(
        trends: Arc<dyn TrendSource>,
        generator: Arc<dyn ImageGenerator>,
        storage: Arc<dyn FileStorage>,
        poster: Arc<dyn SocialPoster>,
        keys: ObjectKeyGenerator<C>,
    ) -> Self {
        Self {
            trends,
            generator,
            storage,
            poster,
            keys,
        }
    }

    /// Runs one cycle: trends, prompt, image, upload, post.
    ///
    /// Trend and generation failures abort the cycle with an error. A missing
    /// image or a failed upload ends the cycle early without posting.
    pub async fn run_cycle(&self) -> Result<(CycleContext, CycleOutcome), CycleError> {
        let cycle_id = Uuid::new_v4();
        self.execute(cycle_id)
            .instrument(tracing::info_span!("cycle", %cycle_id))
            .await
    }

    async fn execute(&self, cycle_id: Uuid) -> Result<(CycleContext, CycleOutcome), CycleError> {
        let trends = fetch_trends(self.trends.as_ref()).await?;
        let mut ctx = CycleContext::new(cycle_id, trends);
        tracing::info!(trends = ?ctx.trends.names(), prompt = %ctx.prompt, "Built prompt from trends");

        let Some(image_png) = synthesize_image(self.generator.as_ref(), &ctx.prompt).await? else {
            return Ok((ctx, CycleOutcome::NoImage));
        };

        let key = self.keys.next_key();
        let stored = store_image(self.storage.as_ref(), image_png.clone(), &key).await;
        let Some(reference) = stored else {
            ctx.image_png = Some(image_png);
            return Ok((ctx, CycleOutcome::UploadFailed));
        };

        let message = PostMessage::from_trends(&ctx.trends);
        let post_id = publish_post(self.poster.as_ref(), &message, &image_png).await;

        ctx.image_png = Some(image_png);
        ctx.storage = Some(reference.clone());
        ctx.message = Some(message);
        ctx.post_id = post_id.clone();

        let outcome = match post_id {
            Some(post_id) => {
                tracing::info!(%post_id, url = %reference.url, "Cycle published");
                CycleOutcome::Published { reference, post_id }
            }
            None => CycleOutcome::PostFailed(reference),
        };
        Ok((ctx, outcome))
    }
}

#[async_trait]
impl<C: Clock> Job for Pipeline<C> {
    /// Cycle boundary: every error ends here as a log line.
    async fn run(&self) {
        match self.run_cycle().await {
            Ok((ctx, outcome)) => tracing::info!(cycle_id = %ctx.cycle_id, ?outcome, "Cycle finished"),
            Err(e) => tracing::error!(error = %e, source = ?e.source(), "Cycle aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PublishError, StorageError};
    use crate::imaging::tests::sample_image;
    use crate::keys::tests::FixedClock;
    use crate::models::Artifact;
    use image::ImageFormat;
    use std::sync::Mutex;

    struct FakeTrends(Result<Vec<&'static str>, ()>);

    #[async_trait]
    impl TrendSource for FakeTrends {
        async fn top_trends(&self, woeid: u64, limit: usize) -> Result<TrendList, TrendError> {
            assert_eq!((woeid, limit), (WORLDWIDE_WOEID, TOP_TRENDS));
            match &self.0 {
                Ok(names) => Ok(TrendList::new(names.iter().map(|n| n.to_string()).collect())),
                Err(()) => Err(TrendError::Rejected { status: 401, body: "Unauthorized".into() }),
            }
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        artifacts: Vec<Artifact>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn returning(artifacts: Vec<Artifact>) -> Self {
            Self { artifacts, ..Default::default() }
        }
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<Vec<Artifact>, GenerationError> {
            assert_eq!(params, &GenerationParams::default());
            self.prompts.lock().unwrap().push(prompt.as_str().to_string());
            Ok(self.artifacts.clone())
        }
    }

    struct FakeStorage {
        bucket: String,
        fail: bool,
        uploads: Mutex<Vec<(String, Vec<u8>, Option<String>)>>,
    }

    impl FakeStorage {
        fn new(bucket: &str, fail: bool) -> Self {
            Self { bucket: bucket.into(), fail, uploads: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl FileStorage for FakeStorage {
        fn bucket_name(&self) -> &str {
            &self.bucket
        }

        async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::UploadFailed("AccessDenied".into()));
            }
            self.uploads.lock().unwrap().push((key.to_string(), data, content_type));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePoster {
        fail: bool,
        posts: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl SocialPoster for FakePoster {
        async fn post_with_image(&self, message: &str, image_png: &[u8]) -> Result<String, PublishError> {
            self.posts.lock().unwrap().push((message.to_string(), image_png.to_vec()));
            if self.fail {
                return Err(PublishError::Rejected { status: 403, body: "duplicate".into() });
            }
            Ok("post-1".into())
        }
    }

    fn image_artifact(bytes: Vec<u8>) -> Artifact {
        Artifact { kind: ArtifactKind::Image, seed: Some(992446758), bytes }
    }

    struct Harness {
        generator: Arc<FakeGenerator>,
        storage: Arc<FakeStorage>,
        poster: Arc<FakePoster>,
        pipeline: Pipeline<FixedClock>,
    }

    fn harness(
        trends: Result<Vec<&'static str>, ()>,
        generator: FakeGenerator,
        storage: FakeStorage,
        poster: FakePoster,
    ) -> Harness {
        let generator = Arc::new(generator);
        let storage = Arc::new(storage);
        let poster = Arc::new(poster);
        let pipeline = Pipeline::new(
            Arc::new(FakeTrends(trends)),
            generator.clone(),
            storage.clone(),
            poster.clone(),
            ObjectKeyGenerator::new(FixedClock::at(1700000000)),
        );
        Harness { generator, storage, poster, pipeline }
    }

    #[tokio::test]
    async fn end_to_end_cycle_uploads_and_posts() {
        let png = sample_image(ImageFormat::Png);
        let h = harness(
            Ok(vec!["x", "y"]),
            FakeGenerator::returning(vec![image_artifact(png)]),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        let (ctx, outcome) = h.pipeline.run_cycle().await.unwrap();

        assert_eq!(h.generator.prompts.lock().unwrap().as_slice(), ["x y"]);

        let uploads = h.storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (key, stored, content_type) = &uploads[0];
        assert_eq!(key, "image_1700000000.png");
        assert_eq!(content_type.as_deref(), Some("image/png"));

        let reference = StorageReference {
            bucket: "bkt".into(),
            key: "image_1700000000.png".into(),
            url: "https://bkt.s3.amazonaws.com/image_1700000000.png".into(),
        };
        assert_eq!(
            outcome,
            CycleOutcome::Published { reference: reference.clone(), post_id: "post-1".into() }
        );

        let posts = h.poster.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "Generated image based on trends: x, y");
        // The post carries exactly the bytes that were stored.
        assert_eq!(&posts[0].1, stored);

        assert_eq!(ctx.prompt.as_str(), "x y");
        assert_eq!(ctx.storage, Some(reference));
        assert_eq!(ctx.post_id.as_deref(), Some("post-1"));
    }

    #[tokio::test]
    async fn non_png_artifact_is_stored_as_png() {
        let h = harness(
            Ok(vec!["x"]),
            FakeGenerator::returning(vec![image_artifact(sample_image(ImageFormat::Bmp))]),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        h.pipeline.run_cycle().await.unwrap();

        let uploads = h.storage.uploads.lock().unwrap();
        assert!(uploads[0].1.starts_with(b"\x89PNG"));
    }

    #[tokio::test]
    async fn first_image_artifact_wins() {
        let filtered = Artifact { kind: ArtifactKind::Filtered, seed: None, bytes: sample_image(ImageFormat::Png) };
        let wanted = sample_image(ImageFormat::Png);
        let h = harness(
            Ok(vec!["x"]),
            FakeGenerator::returning(vec![filtered, image_artifact(wanted), image_artifact(b"junk".to_vec())]),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        let (_, outcome) = h.pipeline.run_cycle().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Published { .. }));
        assert_eq!(h.storage.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_image_artifact_skips_upload_and_post() {
        let h = harness(
            Ok(vec!["x", "y"]),
            FakeGenerator::returning(vec![
                Artifact { kind: ArtifactKind::Filtered, seed: None, bytes: vec![1, 2, 3] },
                Artifact { kind: ArtifactKind::Error, seed: None, bytes: Vec::new() },
            ]),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        let (ctx, outcome) = h.pipeline.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::NoImage);
        assert!(ctx.image_png.is_none());
        assert!(h.storage.uploads.lock().unwrap().is_empty());
        assert!(h.poster.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_skips_post() {
        let h = harness(
            Ok(vec!["x", "y"]),
            FakeGenerator::returning(vec![image_artifact(sample_image(ImageFormat::Png))]),
            FakeStorage::new("bkt", true),
            FakePoster::default(),
        );

        let (ctx, outcome) = h.pipeline.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::UploadFailed);
        assert!(ctx.storage.is_none());
        assert!(h.poster.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_post_is_absorbed() {
        let h = harness(
            Ok(vec!["x"]),
            FakeGenerator::returning(vec![image_artifact(sample_image(ImageFormat::Png))]),
            FakeStorage::new("bkt", false),
            FakePoster { fail: true, ..Default::default() },
        );

        let (ctx, outcome) = h.pipeline.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::PostFailed(ref r) if r.key == "image_1700000000.png"));
        assert!(ctx.post_id.is_none());
        assert_eq!(h.poster.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn trend_failure_aborts_before_generation() {
        let h = harness(
            Err(()),
            FakeGenerator::returning(vec![image_artifact(sample_image(ImageFormat::Png))]),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        let err = h.pipeline.run_cycle().await.unwrap_err();

        assert!(matches!(err, CycleError::Trends(TrendError::Rejected { status: 401, .. })));
        assert!(h.generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_trend_list_aborts() {
        let h = harness(
            Ok(vec![]),
            FakeGenerator::default(),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        let err = h.pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Trends(TrendError::Empty(1))));
    }

    #[tokio::test]
    async fn undecodable_image_aborts_cycle() {
        let h = harness(
            Ok(vec!["x"]),
            FakeGenerator::returning(vec![image_artifact(b"not an image".to_vec())]),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        let err = h.pipeline.run_cycle().await.unwrap_err();

        assert!(matches!(err, CycleError::Generation(GenerationError::UndecodableImage(_))));
        assert!(h.storage.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn job_swallows_cycle_errors() {
        let h = harness(
            Err(()),
            FakeGenerator::default(),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );
        // Must return normally so the scheduler keeps going.
        Job::run(&h.pipeline).await;
    }

    #[tokio::test]
    async fn back_to_back_cycles_use_distinct_keys() {
        let h = harness(
            Ok(vec!["x"]),
            FakeGenerator::returning(vec![image_artifact(sample_image(ImageFormat::Png))]),
            FakeStorage::new("bkt", false),
            FakePoster::default(),
        );

        h.pipeline.run_cycle().await.unwrap();
        h.pipeline.run_cycle().await.unwrap();

        let uploads = h.storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 2);
        assert_ne!(uploads[0].0, uploads[1].0);
    }
}
