use crate::{
    config::StabilitySettings,
    domain::ImageGenerator,
    errors::GenerationError,
    models::{Artifact, ArtifactKind, GenerationParams, Prompt, Sampler},
};
use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
struct TextPrompt<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
struct TextToImageRequest<'a> {
    text_prompts: [TextPrompt<'a>; 1],
    seed: u64,
    steps: u32,
    cfg_scale: f32,
    width: u32,
    height: u32,
    samples: u32,
    sampler: Sampler,
}

impl<'a> TextToImageRequest<'a> {
    fn new(prompt: &'a Prompt, params: &GenerationParams) -> Self {
        Self {
            text_prompts: [TextPrompt { text: prompt.as_str() }],
            seed: params.seed,
            steps: params.steps,
            cfg_scale: params.cfg_scale,
            width: params.width,
            height: params.height,
            samples: params.samples,
            sampler: params.sampler,
        }
    }
}

#[derive(Deserialize, Debug)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<RawArtifact>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    base64: Option<String>,
    seed: Option<u64>,
    finish_reason: Option<String>,
}

/// Converts a text-to-image response body into artifacts.
/// Only successful, non-empty payloads count as images.
pub fn parse_artifacts(body: &str) -> Result<Vec<Artifact>, GenerationError> {
    let response: TextToImageResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    response
        .artifacts
        .into_iter()
        .map(|raw| {
            let bytes = match raw.base64.as_deref() {
                Some(encoded) => base64_engine
                    .decode(encoded)
                    .map_err(|e| GenerationError::Malformed(format!("artifact payload is not base64: {}", e)))?,
                None => Vec::new(),
            };
            let kind = match raw.finish_reason.as_deref() {
                Some("CONTENT_FILTERED") => ArtifactKind::Filtered,
                Some("SUCCESS") | None if !bytes.is_empty() => ArtifactKind::Image,
                _ => ArtifactKind::Error,
            };
            Ok(Artifact {
                kind,
                seed: raw.seed,
                bytes,
            })
        })
        .collect()
}

/// Client for the Stability REST text-to-image endpoint.
#[derive(Debug, Clone)]
pub struct StabilityClient {
    http: reqwest::Client,
    settings: StabilitySettings,
}

impl StabilityClient {
    pub fn new(http: reqwest::Client, settings: StabilitySettings) -> Self {
        tracing::info!(host = %settings.host, engine = %settings.engine, "Initializing StabilityClient");
        Self { http, settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/generation/{}/text-to-image",
            self.settings.host, self.settings.engine
        )
    }
}

#[async_trait]
impl ImageGenerator for StabilityClient {
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<Vec<Artifact>, GenerationError> {
        let url = self.endpoint();
        tracing::debug!(%url, %prompt, seed = params.seed, steps = params.steps, "Stability: Requesting image");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&TextToImageRequest::new(prompt, params))
            .send()
            .await
            .context(format!("Stability: Generation request to '{}' failed", url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Stability: Failed to read generation response body")?;
        if !status.is_success() {
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let artifacts = parse_artifacts(&body)?;
        tracing::debug!(count = artifacts.len(), "Stability: Received artifacts");
        Ok(artifacts)
    }
}
