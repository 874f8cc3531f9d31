use std::{env, fmt, time::Duration};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// OAuth1 consumer and access token pair shared by the trends and posting APIs.
#[derive(Clone)]
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

// Secrets never reach the logs.
impl fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct AwsSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    // Optional endpoint for LocalStack
    pub endpoint_url: Option<String>,
}

impl fmt::Debug for AwsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSettings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct StabilitySettings {
    pub api_key: String,
    pub host: String,
    pub engine: String,
}

impl fmt::Debug for StabilitySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StabilitySettings")
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .field("engine", &self.engine)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub twitter: TwitterCredentials,
    pub aws: AwsSettings,
    pub stability: StabilitySettings,
    pub bucket_name: String,
    pub schedule_interval: Duration,
    pub http_timeout: Duration,
    pub run_on_start: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(name.into()))
        };

        let twitter = TwitterCredentials {
            consumer_key: required("TWITTER_CONSUMER_KEY")?,
            consumer_secret: required("TWITTER_CONSUMER_SECRET")?,
            access_token: required("TWITTER_ACCESS_TOKEN")?,
            access_token_secret: required("TWITTER_ACCESS_TOKEN_SECRET")?,
        };

        let aws = AwsSettings {
            access_key_id: required("AWS_ACCESS_KEY_ID")?,
            secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            region: lookup("AWS_DEFAULT_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            endpoint_url: lookup("AWS_ENDPOINT_URL"),
        };

        let stability = StabilitySettings {
            api_key: required("STABILITY_KEY")?,
            host: lookup("STABILITY_HOST")
                .unwrap_or_else(|| "https://api.stability.ai".to_string())
                .trim_end_matches('/')
                .to_string(),
            engine: lookup("STABILITY_ENGINE")
                .unwrap_or_else(|| "stable-diffusion-v1-6".to_string()),
        };

        let bucket_name = required("AWS_S3_BUCKET")?;

        let schedule_interval = positive_secs(&lookup, "SCHEDULE_INTERVAL_SECS", 3600)?;
        let http_timeout = positive_secs(&lookup, "HTTP_TIMEOUT_SECS", 60)?;

        let run_on_start = match lookup("RUN_ON_START") {
            Some(raw) => raw
                .trim()
                .parse::<bool>()
                .map_err(|e| ConfigError::InvalidVar("RUN_ON_START".into(), e.to_string()))?,
            None => false,
        };

        Ok(Config {
            twitter,
            aws,
            stability,
            bucket_name,
            schedule_interval,
            http_timeout,
            run_on_start,
        })
    }
}

fn positive_secs<F>(lookup: &F, name: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidVar(name.into(), e.to_string()))?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::InvalidVar(name.into(), "must be greater than zero".into()));
    }
    Ok(Duration::from_secs(secs))
}
