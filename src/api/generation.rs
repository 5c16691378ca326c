use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{ApiConfig, Resolution};
use crate::error::{Result, VideoError};

/// Result of one image request. Failures carry the reason instead of an error
/// so the caller can always fall back to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFetch {
    Bytes(Vec<u8>),
    Failed(String),
}

/// Anything that can turn a prompt into encoded image bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, prompt: &str, resolution: Resolution) -> ImageFetch;
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub n: u32,
    pub size: String,
    pub response_format: &'a str,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(model: &'a str, prompt: &'a str, size: String) -> Self {
        Self {
            model,
            prompt,
            n: 1,
            size,
            response_format: "url",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    b64_json: Option<String>,
}

/// Where the image bytes of a successful generation live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Url(String),
    Inline(Vec<u8>),
}

/// Pulls the first image out of a generation response body.
pub fn extract_payload(body: &str) -> Result<ImagePayload> {
    let response: GenerationResponse = serde_json::from_str(body)?;
    let first = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| VideoError::ApiError("No image data in response".to_string()))?;

    if let Some(url) = first.url.filter(|url| !url.is_empty()) {
        return Ok(ImagePayload::Url(url));
    }
    if let Some(encoded) = first.b64_json {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| VideoError::ApiError(format!("Invalid base64 image data: {}", e)))?;
        return Ok(ImagePayload::Inline(bytes));
    }
    Err(VideoError::ApiError("Response has neither url nor b64_json".to_string()))
}

#[derive(Debug, Clone)]
pub struct ImageClient {
    api: ApiConfig,
    client: Client,
}

impl ImageClient {
    pub fn new(api: ApiConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = api.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { api, client })
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Sends one generation request and downloads the resulting image.
    pub async fn generate_image(&self, prompt: &str, resolution: Resolution) -> Result<Vec<u8>> {
        info!("Generating image for prompt: {}", prompt);

        let request = GenerationRequest::new(&self.api.model, prompt, resolution.to_string());
        let response = self
            .client
            .post(self.api.generations_url())
            .bearer_auth(&self.api.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(VideoError::ApiError(format!(
                "Image generation API error: {} - {}",
                status, body
            )));
        }

        match extract_payload(&body)? {
            ImagePayload::Inline(bytes) => Ok(bytes),
            ImagePayload::Url(url) => {
                info!("Downloading image from: {}", url);
                let download = self.client.get(&url).send().await?;
                if !download.status().is_success() {
                    return Err(VideoError::ApiError(format!(
                        "Image download failed: {}",
                        download.status()
                    )));
                }
                Ok(download.bytes().await?.to_vec())
            }
        }
    }
}

#[async_trait]
impl ImageSource for ImageClient {
    async fn fetch(&self, prompt: &str, resolution: Resolution) -> ImageFetch {
        match self.generate_image(prompt, resolution).await {
            Ok(bytes) => ImageFetch::Bytes(bytes),
            Err(e) => {
                warn!("Image generation failed: {}", e);
                ImageFetch::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_api_shape() {
        let request = GenerationRequest::new("glm-4.6v-flash", "a sunny beach", "1280x720".to_string());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "glm-4.6v-flash",
                "prompt": "a sunny beach",
                "n": 1,
                "size": "1280x720",
                "response_format": "url"
            })
        );
    }

    #[test]
    fn extracts_url() {
        let payload = extract_payload(r#"{"data":[{"url":"https://cdn.example.com/a.png"}]}"#).unwrap();
        assert_eq!(payload, ImagePayload::Url("https://cdn.example.com/a.png".to_string()));
    }

    #[test]
    fn decodes_inline_base64() {
        let payload = extract_payload(r#"{"data":[{"b64_json":"aGVsbG8="}]}"#).unwrap();
        assert_eq!(payload, ImagePayload::Inline(b"hello".to_vec()));
    }

    #[test]
    fn missing_data_is_an_error() {
        assert!(extract_payload(r#"{"data":[]}"#).is_err());
        assert!(extract_payload(r#"{"error":"quota"}"#).is_err());
        assert!(extract_payload(r#"{"data":[{"url":""}]}"#).is_err());
        assert!(extract_payload(r#"{"data":[{"b64_json":"@@@"}]}"#).is_err());
        assert!(extract_payload("not json").is_err());
    }
}
