//! Minimal OpenAI HTTP client shared by the completion and embedding calls.
//!
//! # Retry Strategy
//!
//! - HTTP 429, 408 and 5xx → retry with exponential backoff
//! - Other HTTP 4xx → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: base, 2×base, 4×base, ... (exponent capped at 5)

use anyhow::Result;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::OpenAiConfig;
use crate::error::ServiceError;

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    backoff: Duration,
}

impl OpenAiClient {
    pub fn new(api_key: &str, config: &OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// POST `body` to `{base_url}/{endpoint}` and return the decoded JSON.
    pub async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value, ServiceError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff * (1u32 << (attempt - 1).min(5));
                debug!(%url, attempt, ?delay, "retrying OpenAI request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            let err = match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            ServiceError::Fatal(format!("invalid JSON from {}: {}", url, e))
                        });
                    }
                    let text = response.text().await.unwrap_or_default();
                    ServiceError::from_status(status, &text)
                }
                Err(e) => ServiceError::from_transport(e),
            };

            if !err.is_retryable() {
                return Err(err);
            }
            warn!(%url, attempt, error = %err, "OpenAI request failed");
            last_err = Some(err);
        }

        Err(last_err
            .unwrap_or_else(|| ServiceError::Retryable("request failed after retries".into())))
    }
}
