//! Bounded retry with a fixed delay between attempts.
//!
//! Used for readiness waits against the target cluster. The schedule is a
//! fixed ceiling of attempts separated by a fixed delay: no jitter and no
//! exponential growth.
//!
//! # Example
//!
//! ```ignore
//! use microvm_common::retry::{retry_fixed, RetryConfig};
//!
//! let result = retry_fixed(
//!     &RetryConfig::default(),
//!     "wait_for_cilium_operator",
//!     || async { client.wait_for_deployment(&cluster, "5m", "Available", "cilium-operator", "kube-system").await },
//! ).await?;
//! ```

use std::time::Duration;

use tracing::{error, warn};

/// Default ceiling of attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default delay between attempts
pub const DEFAULT_BACKOFF_PERIOD: Duration = Duration::from_secs(5);

/// Configuration for bounded retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_BACKOFF_PERIOD,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given ceiling and delay
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Execute an async operation until it succeeds or the attempt ceiling is hit.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name for logging purposes
/// * `operation` - The async operation to retry
///
/// # Returns
/// The result of the operation, or the last error once `max_attempts` is exhausted.
pub async fn retry_fixed<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = config.delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(config.delay).await;
            }
        }
    }
}
