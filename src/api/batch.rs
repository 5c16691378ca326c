use std::time::Duration;

use reqwest::StatusCode;
use tracing::{info, warn};

use super::generation::{extract_payload, GenerationRequest, ImagePayload};
use super::ImageClient;
use crate::config::ApiConfig;
use crate::error::Result;

/// Image size requested by the batch generator.
pub const BATCH_SIZE: &str = "1024x1024";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BASE_BACKOFF: Duration = Duration::from_secs(10);

/// How a single batch request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success(String),
    RateLimited,
    TimedOut,
    Failed(String),
}

/// What the batch loop does after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Finish(Option<String>),
    Retry { delay: Duration },
}

/// Generates one image URL per prompt, backing off on rate limits.
pub struct BatchGenerator {
    client: ImageClient,
    max_retries: u32,
    base_backoff: Duration,
}

impl BatchGenerator {
    pub fn new(mut api: ApiConfig, max_retries: u32) -> Result<Self> {
        api.timeout = Some(REQUEST_TIMEOUT);
        Ok(Self {
            client: ImageClient::new(api)?,
            max_retries,
            base_backoff: BASE_BACKOFF,
        })
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Decides the next step: 429 sleeps `base * 2^attempt`, timeouts retry at
    /// once, everything else ends the prompt.
    pub fn next_step(&self, result: AttemptResult, attempt: u32) -> Step {
        match result {
            AttemptResult::Success(url) => Step::Finish(Some(url)),
            AttemptResult::RateLimited => Step::Retry {
                delay: self.base_backoff * 2u32.saturating_pow(attempt),
            },
            AttemptResult::TimedOut => Step::Retry {
                delay: Duration::ZERO,
            },
            AttemptResult::Failed(_) => Step::Finish(None),
        }
    }

    /// Runs every prompt in order. Failed prompts are recorded as `None`.
    pub async fn generate_all(&self, prompts: &[String]) -> Vec<Option<String>> {
        info!("Generating images for {} prompts...", prompts.len());
        let mut urls = Vec::with_capacity(prompts.len());

        for (i, prompt) in prompts.iter().enumerate() {
            info!("Generating image {}/{}: {:.50}...", i + 1, prompts.len(), prompt);
            urls.push(self.generate_one(prompt).await);
        }

        urls
    }

    async fn generate_one(&self, prompt: &str) -> Option<String> {
        let mut attempt = 0;
        while attempt < self.max_retries {
            let result = self.attempt(prompt).await;
            match &result {
                AttemptResult::Success(_) => info!("Image generated successfully"),
                AttemptResult::RateLimited => warn!("Rate limit (429) error, waiting before retry..."),
                AttemptResult::TimedOut => warn!("Request timed out, retrying..."),
                AttemptResult::Failed(reason) => warn!("Image generation failed: {}", reason),
            }
            match self.next_step(result, attempt) {
                Step::Finish(url) => return url,
                Step::Retry { delay } => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
        warn!("Failed to generate image after {} retries", self.max_retries);
        None
    }

    async fn attempt(&self, prompt: &str) -> AttemptResult {
        let api = self.client.api();
        let request = GenerationRequest::new(&api.model, prompt, BATCH_SIZE.to_string());
        let sent = self
            .client
            .http()
            .post(api.generations_url())
            .bearer_auth(&api.api_key)
            .json(&request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return AttemptResult::TimedOut,
            Err(e) => return AttemptResult::Failed(format!("Request error: {}", e)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return AttemptResult::TimedOut,
            Err(e) => return AttemptResult::Failed(format!("Request error: {}", e)),
        };
        classify_response(status, &body)
    }
}

fn classify_response(status: StatusCode, body: &str) -> AttemptResult {
    match status {
        StatusCode::OK => match extract_payload(body) {
            Ok(ImagePayload::Url(url)) => AttemptResult::Success(url),
            Ok(ImagePayload::Inline(_)) => {
                AttemptResult::Failed("Response carried inline data instead of a URL".to_string())
            }
            Err(e) => AttemptResult::Failed(e.to_string()),
        },
        StatusCode::TOO_MANY_REQUESTS => AttemptResult::RateLimited,
        other => AttemptResult::Failed(format!("Error {} generating image: {}", other.as_u16(), body)),
    }
}

/// Renders the plain-text report written next to the infobox script.
pub fn render_report(prompts: &[String], urls: &[Option<String>]) -> String {
    let mut report = String::from("Generated Images Report\n=======================\n\n");
    for (i, (prompt, url)) in prompts.iter().zip(urls).enumerate() {
        report.push_str(&format!("Image {}:\n", i + 1));
        report.push_str(&format!("  Prompt: {}\n", prompt));
        report.push_str(&format!("  URL: {}\n\n", url.as_deref().unwrap_or("FAILED")));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> BatchGenerator {
        BatchGenerator::new(ApiConfig::new("http://127.0.0.1:9", "key"), 3).unwrap()
    }

    #[test]
    fn rate_limit_backs_off_exponentially() {
        let batch = generator();
        let delays: Vec<Step> = (0..3)
            .map(|attempt| batch.next_step(AttemptResult::RateLimited, attempt))
            .collect();
        assert_eq!(
            delays,
            vec![
                Step::Retry { delay: Duration::from_secs(10) },
                Step::Retry { delay: Duration::from_secs(20) },
                Step::Retry { delay: Duration::from_secs(40) },
            ]
        );
    }

    #[test]
    fn timeouts_retry_immediately() {
        assert_eq!(
            generator().next_step(AttemptResult::TimedOut, 1),
            Step::Retry { delay: Duration::ZERO }
        );
    }

    #[test]
    fn other_failures_are_terminal() {
        let batch = generator();
        assert_eq!(batch.next_step(AttemptResult::Failed("500".into()), 0), Step::Finish(None));
        assert_eq!(
            batch.next_step(AttemptResult::Success("u".into()), 2),
            Step::Finish(Some("u".into()))
        );
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(
            classify_response(StatusCode::OK, r#"{"data":[{"url":"https://x/y.png"}]}"#),
            AttemptResult::Success("https://x/y.png".into())
        );
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, ""),
            AttemptResult::RateLimited
        );
        assert!(matches!(
            classify_response(StatusCode::OK, r#"{"data":[]}"#),
            AttemptResult::Failed(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_REQUEST, "bad"),
            AttemptResult::Failed(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_records_none_and_continues() {
        let batch = generator().with_base_backoff(Duration::ZERO);
        let prompts = vec!["one".to_string(), "two".to_string()];
        let urls = batch.generate_all(&prompts).await;
        assert_eq!(urls, vec![None, None]);
    }

    #[test]
    fn report_marks_failures() {
        let report = render_report(
            &["a cat".to_string(), "a dog".to_string()],
            &[Some("https://x/cat.png".to_string()), None],
        );
        assert!(report.starts_with("Generated Images Report\n"));
        assert!(report.contains("Image 1:\n  Prompt: a cat\n  URL: https://x/cat.png\n"));
        assert!(report.contains("Image 2:\n  Prompt: a dog\n  URL: FAILED\n"));
    }
}
