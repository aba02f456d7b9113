use std::env;
use std::time::Duration;

use crate::error::{BalancerError, Result};
use crate::models::ProxyAddress;

/// Balancer configuration
///
/// All knobs are optional; defaults match a conservative deployment behind
/// rate-limited upstream proxies.
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    /// How long a fetched proxy pool stays fresh before the next refresh
    pub pool_expired: Duration,
    /// Maximum concurrently-executing transport calls
    pub max_concurrent: usize,
    /// Minimum elapsed time between successive dispatch starts
    pub min_time: Duration,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Per-proxy-hop connect timeout, independent of the request timeout
    pub proxy_timeout: Duration,
    /// Additional attempts after the first failed one
    pub max_retries: u32,
    /// Minimum sample size before health evaluation penalizes a proxy
    pub health_check_min_req_num: u64,
    /// Maximum tolerated lifetime failure rate (strict upper bound)
    pub health_check_max_fail_rate: f64,
    /// Proxy used unconditionally on the terminal retry attempt
    pub fallback_proxy: Option<ProxyAddress>,
    /// Capacity of the per-proxy window of recent outcomes
    pub stats_stack_size: usize,
    /// Age after which an untouched stats entry is evicted
    pub stats_cleanup_timeout: Duration,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            pool_expired: Duration::from_secs(360),
            max_concurrent: 25,
            min_time: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
            proxy_timeout: Duration::from_secs(2),
            max_retries: 5,
            health_check_min_req_num: 30,
            health_check_max_fail_rate: 0.8,
            fallback_proxy: None,
            stats_stack_size: 50,
            stats_cleanup_timeout: Duration::from_secs(60 * 60),
        }
    }
}

impl BalancerConfig {
    /// Load configuration from `RONDO_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            pool_expired: Duration::from_secs(parse_env(
                "RONDO_POOL_EXPIRED_SECS",
                defaults.pool_expired.as_secs(),
            )?),
            max_concurrent: parse_env("RONDO_MAX_CONCURRENT", defaults.max_concurrent)?,
            min_time: Duration::from_millis(parse_env(
                "RONDO_MIN_TIME_MS",
                defaults.min_time.as_millis() as u64,
            )?),
            timeout: Duration::from_secs(parse_env(
                "RONDO_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            proxy_timeout: Duration::from_secs(parse_env(
                "RONDO_PROXY_TIMEOUT_SECS",
                defaults.proxy_timeout.as_secs(),
            )?),
            max_retries: parse_env("RONDO_MAX_RETRIES", defaults.max_retries)?,
            health_check_min_req_num: parse_env(
                "RONDO_HEALTH_MIN_REQ_NUM",
                defaults.health_check_min_req_num,
            )?,
            health_check_max_fail_rate: parse_env(
                "RONDO_HEALTH_MAX_FAIL_RATE",
                defaults.health_check_max_fail_rate,
            )?,
            fallback_proxy: env::var("RONDO_FALLBACK_PROXY")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(ProxyAddress::from),
            stats_stack_size: parse_env("RONDO_STATS_STACK_SIZE", defaults.stats_stack_size)?,
            stats_cleanup_timeout: Duration::from_secs(parse_env(
                "RONDO_STATS_CLEANUP_SECS",
                defaults.stats_cleanup_timeout.as_secs(),
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(BalancerError::InvalidConfig(
                "max_concurrent must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.health_check_max_fail_rate) {
            return Err(BalancerError::InvalidConfig(
                "health_check_max_fail_rate must be within 0.0..=1.0".into(),
            ));
        }
        if self.stats_stack_size == 0 {
            return Err(BalancerError::InvalidConfig(
                "stats_stack_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| BalancerError::InvalidConfig(format!("{} must be a valid number", key))),
        Err(_) => Ok(default),
    }
}
