//! Async HTTP fetcher for remote package descriptors and resource data.

use std::time::Duration;

use reqwest::{Client, Response};
use tokio::time::{sleep, timeout};

use crate::config::NetworkConfig;
use crate::error::ValidationError;

/// Async HTTP client with timeouts, bounded retries, and exponential backoff.
pub struct HttpFetcher {
    client: Client,
    config: NetworkConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given network configuration.
    pub fn new(config: NetworkConfig) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(format!("validate-hsds/{}", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(ValidationError::from)?;

        Ok(Self { client, config })
    }

    /// Fetch a URL fully into memory, retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, ValidationError> {
        let response = self.get_with_retry(url).await?;
        let bytes = response.bytes().await.map_err(ValidationError::from)?;
        Ok(bytes.to_vec())
    }

    /// Fetch a URL and decode it as UTF-8 text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, ValidationError> {
        let bytes = self.fetch(url).await?;
        String::from_utf8(bytes).map_err(|e| ValidationError::Config(format!(
            "response from {url} is not valid UTF-8: {e}"
        )))
    }

    /// Issue a GET with bounded retries and exponential backoff. Server
    /// errors (5xx) and transport failures retry; client errors do not.
    async fn get_with_retry(&self, url: &str) -> Result<Response, ValidationError> {
        let mut attempt = 0;

        loop {
            match self.make_request(url).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = ValidationError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                    if status.is_server_error() && attempt < self.config.retry_attempts {
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
                Err(error) => {
                    if attempt < self.config.retry_attempts && is_retryable(&error) {
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Make a single GET request with a timeout.
    async fn make_request(&self, url: &str) -> Result<Response, ValidationError> {
        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.get(url).send(),
        )
        .await
        .map_err(|_| ValidationError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(ValidationError::from)
    }

    /// Wait before retry with exponential backoff.
    async fn wait_before_retry(&self, attempt: u32) {
        let delay_ms = self.config.retry_delay_ms * 2_u64.pow(attempt);
        let capped = delay_ms.min(self.config.max_retry_delay_ms);
        sleep(Duration::from_millis(capped)).await;
    }

    /// Network configuration in use.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

/// Whether an error is worth retrying.
fn is_retryable(error: &ValidationError) -> bool {
    match error {
        ValidationError::Http(reqwest_error) => {
            reqwest_error.is_timeout() || reqwest_error.is_connect() || reqwest_error.is_request()
        }
        ValidationError::Timeout { .. } => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetcher_creation() {
        let fetcher = HttpFetcher::new(NetworkConfig::default());
        assert!(fetcher.is_ok());
    }

    #[tokio::test]
    async fn test_backoff_is_capped() {
        let config = NetworkConfig {
            retry_delay_ms: 100,
            max_retry_delay_ms: 150,
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(config).unwrap();

        let start = std::time::Instant::now();
        fetcher.wait_before_retry(4).await; // uncapped: 1600ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(140));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retryable_error_detection() {
        let timeout_error = ValidationError::Timeout {
            url: "http://example.com".to_string(),
            timeout_seconds: 30,
        };
        assert!(is_retryable(&timeout_error));

        let status_error = ValidationError::HttpStatus {
            url: "http://example.com".to_string(),
            status: 404,
        };
        assert!(!is_retryable(&status_error));
    }

    #[tokio::test]
    async fn test_fetch_rejects_unreachable_host() {
        let config = NetworkConfig {
            timeout_seconds: 1,
            retry_attempts: 0,
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(config).unwrap();
        let result = fetcher.fetch("http://127.0.0.1:1/none").await;
        assert!(result.is_err());
    }
}
