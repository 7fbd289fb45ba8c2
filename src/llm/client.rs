//! HTTP client for the model serving endpoint

use super::types::{ChatRequest, ChatResponse, EndpointError};
use super::TextGenerator;
use crate::config::GeneratorConfig;
use crate::error::AppError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

/// Client for `POST {base}/serving-endpoints/{endpoint}/invocations`
pub struct ServingEndpointClient {
    client: Client,
    url: String,
    api_token: String,
    endpoint: String,
    max_tokens: u32,
    temperature: f32,
    max_retries: u32,
}

/// Outcome of one HTTP attempt
enum Attempt {
    Done(String),
    Retry(String),
    Fail(String),
}

impl ServingEndpointClient {
    pub fn new(config: &GeneratorConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: invocation_url(&config.base_url, &config.endpoint),
            api_token: config.api_token.clone(),
            endpoint: config.endpoint.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    async fn attempt(&self, body: &ChatRequest) -> Attempt {
        let response = match self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(format!("request failed: {}", e)),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<ChatResponse>().await {
                Ok(parsed) => match parsed.first_text() {
                    Some(text) => Attempt::Done(text),
                    None => Attempt::Fail("response contained no choices".to_string()),
                },
                Err(e) => Attempt::Fail(format!("invalid response body: {}", e)),
            };
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<EndpointError>(&text)
            .map(|e| e.describe())
            .unwrap_or(text);
        let message = format!("endpoint returned {}: {}", status.as_u16(), message);

        if is_retryable(status) {
            Attempt::Retry(message)
        } else {
            Attempt::Fail(message)
        }
    }
}

#[async_trait]
impl TextGenerator for ServingEndpointClient {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let body = ChatRequest::user(prompt, self.max_tokens, self.temperature);
        let mut attempt = 0;

        loop {
            match self.attempt(&body).await {
                Attempt::Done(text) => return Ok(text),
                Attempt::Fail(message) => {
                    return Err(AppError::Transport(format!("Model '{}' {}", self.endpoint, message)))
                }
                Attempt::Retry(message) if attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    debug!(
                        "Model '{}' attempt {} failed ({}), retrying in {:?}",
                        self.endpoint,
                        attempt + 1,
                        message,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Attempt::Retry(message) => {
                    warn!("Model '{}' gave up after {} attempts", self.endpoint, attempt + 1);
                    return Err(AppError::Transport(format!("Model '{}' {}", self.endpoint, message)));
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for ServingEndpointClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServingEndpointClient")
            .field("url", &self.url)
            .field("api_token", &"[REDACTED]")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn invocation_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/serving-endpoints/{}/invocations",
        base_url.trim_end_matches('/'),
        endpoint
    )
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Exponential backoff with up to 50% added jitter
fn backoff_delay(attempt: u32) -> Duration {
    let base = INITIAL_BACKOFF_MS
        .saturating_mul(1u64 << attempt.min(16))
        .min(MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}
