//! Rate-limited document fetcher.
//!
//! One GET per call, decoded to UTF-8 from whatever charset the page uses,
//! followed by the configured pause. Retrying is left to the caller.

use async_trait::async_trait;
use chardetng::EncodingDetector;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, trace};

use super::rate_limiter::RateLimiter;
use crate::config::ScraperConfig;
use crate::error::ScrapeError;

/// Anything that can turn a URL into a decoded document
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

/// HTTP fetcher backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let limiter = RateLimiter::from_millis(config.delay_ms);
        debug!("Fetcher ready, {:?} between requests", limiter.delay());

        Ok(Self { client, limiter })
    }

    async fn get(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::transient(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(ScrapeError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(ScrapeError::transient(url, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ScrapeError::transient(url, e))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ScrapeError::NotFound(url.to_string()));
        }

        Ok(decode_body(&bytes))
    }
}

#[async_trait]
impl DocumentSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        debug!("Fetching {}", url);
        let outcome = self.get(url).await;
        self.limiter.pause().await;
        outcome
    }
}

/// Decode a response body, guessing the charset from its bytes.
pub fn decode_body(bytes: &[u8]) -> String {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);

    let (text, used, had_errors) = encoding.decode(bytes);
    trace!("Decoded {} bytes as {}", bytes.len(), used.name());
    if had_errors {
        debug!("Malformed sequences replaced while decoding as {}", used.name());
    }
    text.into_owned()
}
