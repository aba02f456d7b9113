//! Proxy balancer
//!
//! Coordinates the pool cache, stats tracker, rotation policy and admission
//! budget around a bounded retry loop. One `Balancer` instance owns all
//! shared state; many logical requests may run through it concurrently.

mod limiter;
mod pool;
mod redact;
mod rotation;
mod stats;

pub use limiter::{AdmissionBudget, AdmissionPermit};
pub use pool::PoolCache;
pub use redact::redact;
pub use rotation::Rotation;
pub use stats::{Outcome, ProxyStats, StatsTracker};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::config::BalancerConfig;
use crate::discovery::ProxySource;
use crate::error::{BalancerError, Result};
use crate::models::{AttemptRecord, ProxyAddress, ProxyResponse, RequestOptions, StatsSnapshot};
use crate::transport;

pub struct Balancer {
    config: BalancerConfig,
    pool: PoolCache,
    stats: StatsTracker,
    rotation: Rotation,
    budget: AdmissionBudget,
}

impl Balancer {
    pub fn new(config: BalancerConfig, source: Arc<dyn ProxySource>) -> Self {
        let pool = PoolCache::new(source, config.pool_expired);
        let stats = StatsTracker::new(&config);
        let budget = AdmissionBudget::new(config.max_concurrent, config.min_time);

        Self {
            config,
            pool,
            stats,
            rotation: Rotation::new(),
            budget,
        }
    }

    /// Construct with default configuration
    pub fn with_source(source: Arc<dyn ProxySource>) -> Self {
        Self::new(BalancerConfig::default(), source)
    }

    /// GET `url` with default options
    pub async fn get(&self, url: &str) -> Result<ProxyResponse> {
        self.request(url, RequestOptions::default()).await
    }

    /// Issue one logical request through the rotating pool, retrying failed
    /// attempts up to `max_retries` additional times
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<ProxyResponse> {
        self.request_with_timeout(url, options, self.config.timeout)
            .await
    }

    /// Like [`request`](Self::request) with a per-attempt timeout override.
    ///
    /// The retry chain is bounded by attempt count, not wall clock; callers
    /// needing an overall deadline impose it externally.
    pub async fn request_with_timeout(
        &self,
        url: &str,
        options: RequestOptions,
        timeout: Duration,
    ) -> Result<ProxyResponse> {
        let mut attempt: u32 = 0;

        loop {
            let last_attempt = attempt == self.config.max_retries;
            // an empty pool propagates immediately: retrying cannot fix it
            // within the same call
            let proxy = self.next_proxy(last_attempt).await?;

            let started = Instant::now();
            let outcome = self.attempt(url, &options, &proxy, timeout).await;
            let elapsed = started.elapsed();

            // record before any retry or surfacing decision, so health
            // accounting reflects every attempt
            self.stats
                .record_outcome(&proxy, outcome.is_ok(), url, elapsed);
            self.log_attempt(url, &proxy, outcome.is_ok(), elapsed, attempt);

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if last_attempt => {
                    warn!(
                        url,
                        proxy = %proxy.redacted(),
                        attempts = attempt + 1,
                        "request failed on terminal attempt: {}",
                        err
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        url,
                        proxy = %proxy.redacted(),
                        attempt = attempt + 1,
                        max_attempts = self.config.max_retries + 1,
                        "attempt failed, rotating: {}",
                        err
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Read-only stats snapshot: per-address summaries plus the redacted
    /// current pool
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(&self.pool.current())
    }

    /// Full internal stats map, cloned out
    pub fn raw_stats(&self) -> Vec<(String, ProxyStats)> {
        self.stats.raw_stats()
    }

    async fn next_proxy(&self, last_attempt: bool) -> Result<ProxyAddress> {
        // amortize the stats sweep against refresh frequency instead of a
        // separate timer
        if self.pool.is_expired() {
            self.stats.cleanup(self.config.stats_cleanup_timeout);
        }

        let pool = self.pool.get().await;
        self.rotation.next(
            &pool,
            &self.stats,
            last_attempt,
            self.config.fallback_proxy.as_ref(),
        )
    }

    /// One attempt: admission slot, transport call, content validation
    async fn attempt(
        &self,
        url: &str,
        options: &RequestOptions,
        proxy: &ProxyAddress,
        timeout: Duration,
    ) -> Result<ProxyResponse> {
        let _permit = self.budget.acquire().await;

        let response = transport::fetch_via_proxy(
            url,
            options,
            proxy,
            timeout,
            self.config.proxy_timeout,
        )
        .await?;

        validate_content(&response, options)?;
        Ok(response)
    }

    fn log_attempt(
        &self,
        url: &str,
        proxy: &ProxyAddress,
        success: bool,
        elapsed: Duration,
        retry: u32,
    ) {
        let record = AttemptRecord {
            timestamp: Utc::now(),
            url: url.to_string(),
            proxy: proxy.redacted(),
            success,
            elapsed_ms: elapsed.as_millis() as u64,
            retry,
        };

        info!(
            target: "rondo::request_log",
            url = %record.url,
            proxy = %record.proxy,
            success = record.success,
            elapsed_ms = record.elapsed_ms,
            retry = record.retry,
            "request attempt"
        );
    }
}

/// Apply the configured body checks. 404 responses are exempt: their bodies
/// are error pages, not content.
fn validate_content(response: &ProxyResponse, options: &RequestOptions) -> Result<()> {
    if response.status == StatusCode::NOT_FOUND {
        return Ok(());
    }

    if !options.text_expected.is_empty()
        && !options
            .text_expected
            .iter()
            .any(|fragment| response.body.contains(fragment))
    {
        return Err(BalancerError::ExpectedTextMissing);
    }

    if options
        .text_not_expected
        .iter()
        .any(|fragment| response.body.contains(fragment))
    {
        return Err(BalancerError::ForbiddenTextFound);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn response(status: StatusCode, body: &str) -> ProxyResponse {
        ProxyResponse {
            status,
            headers: HeaderMap::new(),
            body: body.to_string(),
            url: "http://target.test/".to_string(),
        }
    }

    #[test]
    fn test_validate_content_expected_text() {
        let options = RequestOptions {
            text_expected: vec!["welcome".to_string(), "hello".to_string()],
            ..RequestOptions::default()
        };

        // one match is enough
        assert!(validate_content(&response(StatusCode::OK, "hello world"), &options).is_ok());

        assert!(matches!(
            validate_content(&response(StatusCode::OK, "goodbye"), &options),
            Err(BalancerError::ExpectedTextMissing)
        ));
    }

    #[test]
    fn test_validate_content_forbidden_text() {
        let options = RequestOptions {
            text_not_expected: vec!["captcha".to_string()],
            ..RequestOptions::default()
        };

        assert!(validate_content(&response(StatusCode::OK, "plain page"), &options).is_ok());
        assert!(matches!(
            validate_content(&response(StatusCode::OK, "solve this captcha"), &options),
            Err(BalancerError::ForbiddenTextFound)
        ));
    }

    #[test]
    fn test_validate_content_exempts_404_bodies() {
        let options = RequestOptions {
            text_expected: vec!["welcome".to_string()],
            text_not_expected: vec!["not found".to_string()],
            ..RequestOptions::default()
        };

        let response = response(StatusCode::NOT_FOUND, "not found");
        assert!(validate_content(&response, &options).is_ok());
    }

    #[test]
    fn test_validate_content_no_rules_passes() {
        let options = RequestOptions::default();
        assert!(validate_content(&response(StatusCode::OK, "anything"), &options).is_ok());
    }
}
