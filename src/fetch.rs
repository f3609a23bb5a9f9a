//! Single-shot page fetching.
//!
//! [`PageFetcher`] is the seam between the pipeline and the network: the
//! pipeline only ever asks for "the text at this URL within this timeout".
//! [`HttpFetcher`] is the real implementation; tests substitute an
//! in-memory one.
//!
//! Fetchers never retry. Retrying is the caller's decision (the pipeline
//! retries detail pages only).

use crate::error::FetchError;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Fetch the decoded text of a page.
pub trait PageFetcher {
    /// GET `url`, failing if no complete response arrives within `timeout`
    /// or the status is not 2xx.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        response.text().await.map_err(|e| classify(url, e))
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let result = self.get_text(url, timeout).await;

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match &result {
            Ok(body) => debug!(elapsed_ms, bytes = body.len(), "Fetched page"),
            Err(e) => warn!(elapsed_ms, error = %e, "Fetch failed"),
        }
        result
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = e.status() {
        FetchError::Status {
            url: url.to_string(),
            status,
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let fetcher = HttpFetcher::new().unwrap();
        // Port 9 (discard) on localhost is almost never listening.
        let err = fetcher
            .fetch("http://127.0.0.1:9/ICCV2023", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.url(), "http://127.0.0.1:9/ICCV2023");
        assert!(matches!(
            err,
            FetchError::Transport { .. } | FetchError::Timeout { .. }
        ));
    }
}
