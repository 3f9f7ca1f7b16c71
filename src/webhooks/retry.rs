// Exponential backoff retry logic for webhook delivery
//
// Retries are off by default (max_retries = 0): each subscription gets a
// single attempt per dispatch. When enabled:
// - Exponential backoff (base, 2x base, 4x base, ...)
// - Jitter to prevent thundering herd
// - Per-attempt timeout grows with the attempt number

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Upper bound for a single attempt's timeout
const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Retry strategy configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay in milliseconds (default 1000ms)
    pub base_delay_ms: u64,
    /// Maximum number of retries after the first attempt (default 0)
    pub max_retries: u32,
    /// Maximum delay between two attempts in milliseconds (default 60000ms)
    pub max_delay_ms: u64,
    /// Use exponential backoff (default true)
    pub use_exponential_backoff: bool,
    /// Add jitter to delay (default true)
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_retries: 0,
            max_delay_ms: 60000,
            use_exponential_backoff: true,
            use_jitter: true,
        }
    }
}

/// What to do after a failed delivery attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry with this delay in milliseconds
    Retry(u64),
    /// Record the failure
    GiveUp,
}

/// Calculate retry delay based on attempt number
///
/// Formula with exponential backoff and optional jitter:
/// delay = min(min(base * 2^attempt, max_delay) +/- 20%, max_delay)
///
/// # Arguments
/// * `attempt` - Zero-indexed number of the attempt that just failed
/// * `config` - Retry configuration
pub fn calculate_retry_delay(attempt: u32, config: &RetryConfig) -> RetryDecision {
    if attempt >= config.max_retries {
        debug!("Max retries ({}) reached, giving up", config.max_retries);
        return RetryDecision::GiveUp;
    }

    let delay_ms = if config.use_exponential_backoff {
        let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
        config.base_delay_ms.saturating_mul(factor)
    } else {
        config.base_delay_ms
    };

    let delay_ms = delay_ms.min(config.max_delay_ms);

    let delay_ms = if config.use_jitter && delay_ms > 0 {
        let jitter = (delay_ms as f64 * 0.2) as u64;
        let mut rng = rand::rng();
        let random_jitter = rng.random_range(0..=jitter);

        if rng.random_bool(0.5) {
            delay_ms.saturating_add(random_jitter).min(config.max_delay_ms)
        } else {
            delay_ms.saturating_sub(random_jitter)
        }
    } else {
        delay_ms
    };

    debug!(
        "Retry after attempt {} - delay {} ms (max: {} ms)",
        attempt, delay_ms, config.max_delay_ms
    );

    RetryDecision::Retry(delay_ms)
}

/// Timeout for a given attempt
///
/// Formula: base_timeout * (1 + attempt * 0.5), capped at 60s.
/// Attempt 0 always uses the base timeout unchanged.
pub fn get_attempt_timeout(attempt: u32, base_timeout: Duration) -> Duration {
    if attempt == 0 {
        return base_timeout;
    }
    let multiplier = 1.0 + (attempt as f64 * 0.5);
    base_timeout.mul_f64(multiplier).min(MAX_ATTEMPT_TIMEOUT)
}
