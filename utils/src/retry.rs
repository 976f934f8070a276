//! Retry policy with exponential backoff.
//!
//! One policy governs every remote read in the workspace: registry queries,
//! proposal reads and content-store fetches. Writes are never routed through
//! here; a reverted transaction goes back to the caller untouched.
//!
//! # Default Policy
//!
//! - Max retries: 3 (4 total attempts)
//! - Initial delay: 250ms
//! - Max delay: 4 seconds
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//! - Staleness bound: 30 seconds

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry configuration shared by the registry client and the content store.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the initial attempt).
    pub max_retries: u32,
    /// Initial backoff delay before first retry.
    pub initial_delay: Duration,
    /// Maximum backoff delay.
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
    /// Age after which a cached read must be refetched before it is trusted.
    pub staleness_bound: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            jitter_factor: 0.25,
            staleness_bound: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff. Useful for tests and for probes.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Errors that know whether another attempt could succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Calculate retry delay with exponential backoff and jitter.
///
/// - `backoff_step`: 0 before first retry, 1 before second, etc.
#[must_use]
pub fn calculate_retry_delay(backoff_step: u32, policy: &RetryPolicy) -> Duration {
    // Exponential backoff: initial_delay * 2^backoff_step
    let base = policy.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(policy.max_delay.as_secs_f64());

    // Down-jitter: multiply by random factor in [1 - jitter_factor, 1.0]
    let jitter = 1.0 - rand::random::<f64>() * policy.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Outcome of a retried operation.
///
/// Structurally distinguishes "gave up after retrying" from "refused to retry",
/// so callers can report the attempt count without re-deriving it.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success(T),
    /// Every attempt failed with a transient error.
    Exhausted { attempts: u32, source: E },
    /// The operation failed with an error that retrying cannot fix.
    NonRetryable(E),
}

impl<T, E> RetryOutcome<T, E> {
    /// Collapse into a `Result`, mapping both failure shapes through `on_error`.
    pub fn into_result<F, E2>(self, on_error: F) -> Result<T, E2>
    where
        F: FnOnce(E, u32) -> E2,
    {
        match self {
            Self::Success(value) => Ok(value),
            Self::Exhausted { attempts, source } => Err(on_error(source, attempts)),
            Self::NonRetryable(source) => Err(on_error(source, 1)),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy is
/// exhausted.
///
/// `label` names the operation in logs.
pub async fn retry_with_backoff<T, E, F, Fut>(
    label: &'static str,
    policy: &RetryPolicy,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut retry_count = 0;
    loop {
        match operation().await {
            Ok(value) => return RetryOutcome::Success(value),
            Err(err) if !err.is_transient() => {
                tracing::debug!(operation = label, error = %err, "Non-retryable failure");
                return RetryOutcome::NonRetryable(err);
            }
            Err(err) if retry_count >= policy.max_retries => {
                tracing::warn!(
                    operation = label,
                    attempts = retry_count + 1,
                    error = %err,
                    "Giving up after exhausting retries"
                );
                return RetryOutcome::Exhausted {
                    attempts: retry_count + 1,
                    source: err,
                };
            }
            Err(err) => {
                let delay = calculate_retry_delay(retry_count, policy);
                retry_count += 1;
                tracing::debug!(
                    operation = label,
                    error = %err,
                    retry_count,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
