use crate::{
    domain::{SocialPoster, TrendSource},
    errors::{PublishError, TrendError},
    models::TrendList,
    oauth::OAuth1Signer,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

const API_BASE: &str = "https://api.twitter.com";
const UPLOAD_BASE: &str = "https://upload.twitter.com";

#[derive(Deserialize, Debug)]
struct PlaceTrends {
    trends: Vec<Trend>,
}

#[derive(Deserialize, Debug)]
struct Trend {
    name: String,
}

#[derive(Deserialize, Debug)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Deserialize, Debug)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Deserialize, Debug)]
struct CreatedPost {
    id: String,
}

/// Twitter client for the trends and posting endpoints, authenticated with OAuth1 user context.
#[derive(Debug, Clone)]
pub struct TwitterClient {
    http: reqwest::Client,
    signer: OAuth1Signer,
    api_base: String,
    upload_base: String,
}

impl TwitterClient {
    pub fn new(http: reqwest::Client, signer: OAuth1Signer) -> Self {
        Self {
            http,
            signer,
            api_base: API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
        }
    }

    /// Uploads the image and returns its media id.
    async fn upload_media(&self, image_png: &[u8]) -> Result<String, PublishError> {
        let url = format!("{}/1.1/media/upload.json", self.upload_base);
        let auth = self
            .signer
            .authorization_header("POST", &url, &[])
            .map_err(PublishError::BackendError)?;

        let part = Part::bytes(image_png.to_vec())
            .file_name("image.png")
            .mime_str("image/png")
            .context("Twitter: Invalid media part")
            .map_err(PublishError::BackendError)?;

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .multipart(Form::new().part("media", part))
            .send()
            .await
            .context("Twitter: Media upload request failed")
            .map_err(PublishError::BackendError)?;

        let body = success_body(response)
            .await
            .map_err(|(status, body)| PublishError::Rejected { status, body })?;
        let uploaded: MediaUploadResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Malformed(e.to_string()))?;

        tracing::debug!(media_id = %uploaded.media_id_string, "Twitter: Media uploaded");
        Ok(uploaded.media_id_string)
    }
}

/// Reads the body of a response, handing back `(status, body)` when the status is not 2xx.
async fn success_body(response: reqwest::Response) -> Result<String, (u16, String)> {
    let status = response.status();
    // A body that cannot be read is reported as empty; the status carries the failure.
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err((status.as_u16(), body))
    }
}

/// Extracts up to `limit` trend names from a `trends/place` response body.
pub fn parse_place_trends(body: &str, woeid: u64, limit: usize) -> Result<TrendList, TrendError> {
    let places: Vec<PlaceTrends> =
        serde_json::from_str(body).map_err(|e| TrendError::Malformed(e.to_string()))?;
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| TrendError::Malformed("response contains no locations".into()))?;

    let names: Vec<String> = place.trends.into_iter().take(limit).map(|t| t.name).collect();
    if names.is_empty() {
        return Err(TrendError::Empty(woeid));
    }
    Ok(TrendList::new(names))
}

#[async_trait]
impl TrendSource for TwitterClient {
    async fn top_trends(&self, woeid: u64, limit: usize) -> Result<TrendList, TrendError> {
        let url = format!("{}/1.1/trends/place.json", self.api_base);
        let id = woeid.to_string();
        let auth = self.signer.authorization_header("GET", &url, &[("id", id.as_str())])?;

        tracing::debug!(woeid, "Twitter: Fetching trends");
        let response = self
            .http
            .get(&url)
            .query(&[("id", &id)])
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await
            .context(format!("Twitter: Trends request for location {} failed", woeid))?;

        let body = success_body(response)
            .await
            .map_err(|(status, body)| TrendError::Rejected { status, body })?;
        let trends = parse_place_trends(&body, woeid, limit)?;
        tracing::info!(woeid, count = trends.len(), "Twitter: Trends fetched");
        Ok(trends)
    }
}

#[async_trait]
impl SocialPoster for TwitterClient {
    async fn post_with_image(&self, message: &str, image_png: &[u8]) -> Result<String, PublishError> {
        let media_id = self.upload_media(image_png).await?;

        let url = format!("{}/2/tweets", self.api_base);
        // JSON bodies are not part of the OAuth1 signature.
        let auth = self.signer.authorization_header("POST", &url, &[])?;
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&json!({
                "text": message,
                "media": { "media_ids": [media_id] },
            }))
            .send()
            .await
            .context("Twitter: Create post request failed")?;

        let body = success_body(response)
            .await
            .map_err(|(status, body)| PublishError::Rejected { status, body })?;
        let created: CreatePostResponse =
            serde_json::from_str(&body).map_err(|e| PublishError::Malformed(e.to_string()))?;

        tracing::info!(post_id = %created.data.id, "Twitter: Post published");
        Ok(created.data.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACE_RESPONSE: &str = r##"[{
        "trends": [
            {"name": "#One", "url": "http://twitter.com/search?q=%23One", "tweet_volume": 1200},
            {"name": "Two", "url": "http://twitter.com/search?q=Two", "tweet_volume": null},
            {"name": "Three", "url": "", "tweet_volume": null},
            {"name": "Four", "url": "", "tweet_volume": null},
            {"name": "Five", "url": "", "tweet_volume": null},
            {"name": "Six", "url": "", "tweet_volume": null}
        ],
        "as_of": "2024-01-01T00:00:00Z",
        "locations": [{"name": "Worldwide", "woeid": 1}]
    }]"##;

    #[test]
    fn keeps_first_five_trends_in_order() {
        let trends = parse_place_trends(PLACE_RESPONSE, 1, 5).unwrap();
        assert_eq!(trends.names(), ["#One", "Two", "Three", "Four", "Five"]);
    }

    #[test]
    fn fewer_trends_than_limit_is_fine() {
        let trends = parse_place_trends(r#"[{"trends":[{"name":"x"},{"name":"y"}]}]"#, 1, 5).unwrap();
        assert_eq!(trends.names(), ["x", "y"]);
    }

    #[test]
    fn empty_trend_list_is_an_error() {
        let err = parse_place_trends(r#"[{"trends":[]}]"#, 1, 5).unwrap_err();
        assert!(matches!(err, TrendError::Empty(1)));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(matches!(parse_place_trends("[]", 1, 5), Err(TrendError::Malformed(_))));
        assert!(matches!(
            parse_place_trends(r#"{"errors":[{"code":88,"message":"Rate limit exceeded"}]}"#, 1, 5),
            Err(TrendError::Malformed(_))
        ));
        assert!(matches!(parse_place_trends("<html>", 1, 5), Err(TrendError::Malformed(_))));
    }

    #[test]
    fn post_response_yields_id() {
        let created: CreatePostResponse =
            serde_json::from_str(r#"{"data":{"id":"1445880548472328192","text":"hi"}}"#).unwrap();
        assert_eq!(created.data.id, "1445880548472328192");
    }
}
