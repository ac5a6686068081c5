use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{HttpConfig, ScrapeConfig};

/// Maximum HTTP response body size (10 MB). Bodies exceeding this limit are
/// truncated during streaming reads rather than rejected after full
/// download, preventing memory exhaustion from unexpectedly large pages.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Substrings that mark a rate-limit / captcha interstitial instead of a
/// real data page. Matched case-insensitively against the whole body.
const BLOCK_INDICATORS: [&str; 6] = [
    "rate limit",
    "captcha",
    "blocked",
    "access denied",
    "too many requests",
    "please wait",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: StatusCode },
}

/// Polite page fetcher: one shared client, a configured delay before every
/// request, bounded retries with backoff for network failures. HTTP error
/// statuses are returned immediately, never retried.
pub struct PageFetcher {
    client: reqwest::Client,
    scrape: ScrapeConfig,
}

impl PageFetcher {
    pub fn new(http: &HttpConfig, scrape: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.clone())
            .timeout(Duration::from_secs(http.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            scrape: scrape.clone(),
        })
    }

    /// Fetch a page, returning its body as text. Awaits the politeness
    /// delay first, then retries network failures up to `max_retries` times
    /// with the configured backoff.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        sleep(self.scrape.request_delay()).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e @ FetchError::Status { .. }) => return Err(e),
                Err(e) => {
                    if attempt > self.scrape.max_retries {
                        warn!("All {} retry attempts exhausted for {}", self.scrape.max_retries, url);
                        return Err(e);
                    }
                    let delay = self.scrape.backoff_delay(attempt);
                    debug!("Attempt {} failed for {} ({}), retrying in {:?}", attempt, url, e, delay);
                    sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        read_body_capped(response, MAX_BODY_BYTES)
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })
    }
}

/// Read an HTTP response body in chunks, stopping at `max_bytes`. Truncated
/// multi-byte boundaries are handled by lossy UTF-8 conversion.
async fn read_body_capped(response: reqwest::Response, max_bytes: usize) -> Result<String, reqwest::Error> {
    use futures::StreamExt;

    let mut body = Vec::with_capacity(max_bytes.min(256 * 1024));
    let mut stream = response.bytes_stream();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = max_bytes.saturating_sub(total);
        if remaining == 0 {
            debug!("HTTP response truncated at {} bytes (limit: {})", total, max_bytes);
            break;
        }
        let take = chunk.len().min(remaining);
        body.extend_from_slice(&chunk[..take]);
        total += take;
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Check whether a fetched body is a block/captcha interstitial rather
/// than a data page.
pub fn looks_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCK_INDICATORS.iter().any(|marker| lower.contains(marker))
}
