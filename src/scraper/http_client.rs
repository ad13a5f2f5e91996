use crate::config::ScraperConfig;
use crate::error::FetchError;
use anyhow::{Context, Result};
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with rate-limiting and retry.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.get_with_retry(url, None).await?;
        resp.text().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            source: e,
        })
    }

    /// Fetch a URL as JSON, optionally with an `Authorization` header.
    pub async fn get_json(
        &self,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        let resp = self.get_with_retry(url, authorization).await?;
        resp.json().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            source: e,
        })
    }

    async fn get_with_retry(
        &self,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<reqwest::Response, FetchError> {
        self.polite_delay().await;

        let mut last_err = FetchError::Status {
            url: url.to_string(),
            status: 0,
        };

        for attempt in 1..=(self.config.max_retries + 1) {
            debug!("GET {} (attempt {})", url, attempt);

            let mut req = self.inner.get(url);
            if let Some(auth) = authorization {
                req = req.header(reqwest::header::AUTHORIZATION, auth);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    } else if status.as_u16() == 429 || status.as_u16() == 503 {
                        // Rate limited — back off harder
                        let backoff = Duration::from_millis(
                            self.config.request_delay_ms * (2u64.pow(attempt)),
                        );
                        warn!(
                            "Rate limited ({}) on attempt {}, sleeping {:?}",
                            status, attempt, backoff
                        );
                        sleep(backoff).await;
                        last_err = FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        };
                    } else {
                        // Don't retry 4xx other than 429
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => {
                    warn!("Request failed on attempt {}: {}", attempt, e);
                    let backoff =
                        Duration::from_millis(self.config.request_delay_ms * (attempt as u64));
                    sleep(backoff).await;
                    last_err = FetchError::Request {
                        url: url.to_string(),
                        source: e,
                    };
                }
            }
        }

        Err(last_err)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.config.jitter_ms);
        let total = Duration::from_millis(self.config.request_delay_ms + jitter);
        sleep(total).await;
    }
}
