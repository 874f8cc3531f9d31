use thiserror::Error; // Use thiserror for cleaner error definitions

// --- Collaborator Errors ---

#[derive(Error, Debug)]
pub enum TrendError {
    #[error("Trends request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed trends response: {0}")]
    Malformed(String),

    #[error("No trends returned for location {0}")]
    Empty(u64),

    #[error("Trends backend error: {0}")]
    BackendError(#[from] anyhow::Error), // Transport failures, with context
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed generation response: {0}")]
    Malformed(String),

    #[error("Generated image could not be decoded")]
    UndecodableImage(#[source] image::ImageError),

    #[error("Generation backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String), // Pass specific reason

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Post rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed publish response: {0}")]
    Malformed(String),

    #[error("Publish backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

// --- Cycle Error ---

/// Failures that abort a cycle and are reported at the scheduler boundary.
/// Storage and publish failures are absorbed inside the cycle instead.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Could not fetch trends")]
    Trends(#[from] TrendError),

    #[error("Could not generate image")]
    Generation(#[from] GenerationError),
}

// --- Startup Error ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String), // Keep simple string for now
    #[error("Initialization error: {0}")]
    InitError(String),
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}
