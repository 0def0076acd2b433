//! Upstream fetch with bounded retry
//!
//! Wraps a pooled `reqwest::Client` and retries transient failures with a
//! linearly increasing delay. Definitive upstream responses (2xx, 3xx, 4xx)
//! are returned on the first attempt; only network errors, timeouts, and 5xx
//! statuses are retried.

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::metrics::MirrorMetrics;
use http::{HeaderMap, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP client for upstream source hosts
pub struct UpstreamFetcher {
    client: reqwest::Client,
    max_retries: usize,
    retry_delay: Duration,
    metrics: Arc<MirrorMetrics>,
}

impl UpstreamFetcher {
    /// Build a fetcher from configuration
    ///
    /// The per-attempt timeout covers the full request, connect included.
    pub fn new(config: &MirrorConfig, metrics: Arc<MirrorMetrics>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| MirrorError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(UpstreamFetcher {
            client,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            metrics,
        })
    }

    /// Fetch an upstream URL, retrying transient failures
    ///
    /// # Arguments
    /// * `method` - Request method to forward (GET or HEAD)
    /// * `url` - Fully composed upstream URL
    /// * `headers` - Already-filtered headers to forward
    ///
    /// # Returns
    /// * `Ok(response)` for any definitive upstream status, including a 5xx
    ///   that persisted through all retries
    /// * `Err` only when every attempt failed at the network level
    pub async fn fetch_with_retry(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0;

        loop {
            let result = self
                .client
                .request(method.clone(), url)
                .headers(headers.clone())
                .send()
                .await;

            match result {
                Ok(response) => {
                    if !response.status().is_server_error() {
                        debug!(
                            url = %url,
                            status = %response.status(),
                            attempt = attempt,
                            "upstream fetch succeeded"
                        );
                        return Ok(response);
                    }
                    // Out of retries: hand the 5xx back as-is rather than
                    // synthesizing an error, so status and headers survive.
                    if attempt >= self.max_retries {
                        warn!(
                            url = %url,
                            status = %response.status(),
                            attempts = attempt + 1,
                            "upstream still failing after retries, passing through"
                        );
                        return Ok(response);
                    }
                    warn!(
                        url = %url,
                        status = %response.status(),
                        attempt = attempt,
                        "upstream server error, retrying"
                    );
                }
                Err(e) => {
                    let err = if e.is_timeout() {
                        MirrorError::Timeout(format!("{}: {}", url, e))
                    } else {
                        MirrorError::UpstreamError(format!("{}: {}", url, e))
                    };
                    if attempt >= self.max_retries || !err.should_retry() {
                        return Err(err);
                    }
                    warn!(url = %url, attempt = attempt, error = %err, "upstream fetch failed, retrying");
                }
            }

            self.metrics.record_retry();
            sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    /// Linear backoff: attempt N (zero-based) waits (N+1) base delays
    fn backoff(&self, attempt: usize) -> Duration {
        self.retry_delay * (attempt as u32 + 1)
    }
}
