//! OAuth 1.0a request signing (HMAC-SHA1), as required by the Twitter v1.1/v2 user-context endpoints.

use crate::config::TwitterCredentials;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as base64_engine, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use uuid::Uuid;

type HmacSha1 = Hmac<Sha1>;

/// Signs requests on behalf of one consumer/access-token pair.
#[derive(Debug, Clone)]
pub struct OAuth1Signer {
    credentials: TwitterCredentials,
}

impl OAuth1Signer {
    pub fn new(credentials: TwitterCredentials) -> Self {
        Self { credentials }
    }

    /// Builds the `Authorization` header for a request.
    ///
    /// `params` must hold every query parameter and every
    /// `application/x-www-form-urlencoded` body parameter; JSON and multipart
    /// bodies are not part of the signature.
    pub fn authorization_header(&self, method: &str, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let creds = &self.credentials;
        let mut oauth_params = vec![
            ("oauth_consumer_key", creds.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", creds.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut all_params = oauth_params.clone();
        all_params.extend_from_slice(params);
        let base = signature_base_string(method, url, &all_params);
        let signature = sign(&base, &creds.consumer_secret, &creds.access_token_secret)?;

        oauth_params.push(("oauth_signature", signature.as_str()));
        oauth_params.sort();
        let header_fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", header_fields))
    }
}

// RFC 3986 percent-encoding; only ALPHA / DIGIT / "-" / "." / "_" / "~" pass through.
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn signature_base_string(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    )
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| anyhow!("invalid HMAC key: {}", e))?;
    mac.update(base.as_bytes());
    Ok(base64_engine.encode(mac.finalize().into_bytes()))
}
