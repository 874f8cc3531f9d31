use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Ordered trend names as reported by the trends source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendList(Vec<String>);

impl TrendList {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    /// Joins the trend names with a single space, keeping their order.
    pub fn from_trends(trends: &TrendList) -> Self {
        Self(trends.names().join(" "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    /// Blurred or withheld by the service's content filter.
    Filtered,
    Error,
}

/// One output returned by the generation service.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub seed: Option<u64>,
    pub bytes: Vec<u8>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    #[serde(rename = "K_DPMPP_2M")]
    KDpmpp2m,
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub seed: u64,
    pub steps: u32,
    pub cfg_scale: f32,
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub sampler: Sampler,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: 992446758,
            steps: 30,
            cfg_scale: 8.0,
            width: 512,
            height: 512,
            samples: 1,
            sampler: Sampler::KDpmpp2m,
        }
    }
}

/// Where an uploaded image lives. The URL is built, not verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReference {
    pub bucket: String,
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage(String);

impl PostMessage {
    pub fn from_trends(trends: &TrendList) -> Self {
        Self(format!(
            "Generated image based on trends: {}",
            trends.names().join(", ")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Values accumulated by one pipeline run, stage by stage.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub cycle_id: Uuid,
    pub trends: TrendList,
    pub prompt: Prompt,
    pub image_png: Option<Vec<u8>>,
    pub storage: Option<StorageReference>,
    pub message: Option<PostMessage>,
    pub post_id: Option<String>,
}

impl CycleContext {
    pub fn new(cycle_id: Uuid, trends: TrendList) -> Self {
        let prompt = Prompt::from_trends(&trends);
        Self {
            cycle_id,
            trends,
            prompt,
            image_png: None,
            storage: None,
            message: None,
            post_id: None,
        }
    }
}

/// How a cycle that did not error ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Published {
        reference: StorageReference,
        post_id: String,
    },
    PostFailed(StorageReference),
    NoImage,
    UploadFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trends(names: &[&str]) -> TrendList {
        TrendList::new(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn prompt_joins_with_single_spaces_in_order() {
        let prompt = Prompt::from_trends(&trends(&["A", "B", "C", "D", "E"]));
        assert_eq!(prompt.as_str(), "A B C D E");
    }

    #[test]
    fn prompt_keeps_names_untouched() {
        let prompt = Prompt::from_trends(&trends(&["#Rust ", "Ünïcode", "two words"]));
        assert_eq!(prompt.as_str(), "#Rust  Ünïcode two words");
    }

    #[test]
    fn post_message_lists_trends_with_commas() {
        let message = PostMessage::from_trends(&trends(&["x", "y"]));
        assert_eq!(message.as_str(), "Generated image based on trends: x, y");
    }

    #[test]
    fn default_params_match_fixed_sampling_settings() {
        let params = GenerationParams::default();
        assert_eq!(params.seed, 992446758);
        assert_eq!(params.steps, 30);
        assert_eq!(params.cfg_scale, 8.0);
        assert_eq!((params.width, params.height), (512, 512));
        assert_eq!(params.samples, 1);
        assert_eq!(serde_json::to_string(&params.sampler).unwrap(), "\"K_DPMPP_2M\"");
    }
}
