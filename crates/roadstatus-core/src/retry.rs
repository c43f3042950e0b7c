//! Retry with exponential back-off and jitter for road status requests.
//!
//! [`retry_with_backoff`] wraps one fallible async operation and retries on
//! transient errors (connection failures, HTTP 429, HTTP 5xx). Everything
//! else, including 404, other 4xx, timeouts, cancellation and malformed
//! bodies, is returned immediately.
//!
//! Every attempt and every back-off sleep is raced against the caller's
//! [`Cancellation`], so a cancelled token or an expired deadline stops the
//! loop at once.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::RoadStatusError;

/// Highest power of two applied to the base delay.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. `0` disables retries.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each retry after that.
    pub base_delay: Duration,
    /// Upper bound of the uniform random delay added to each back-off.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_jitter,
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retries() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Back-off before retry number `retry` (1-based), without jitter.
    ///
    /// | Retry | Delay            |
    /// |-------|------------------|
    /// | 1     | `base_delay × 1` |
    /// | 2     | `base_delay × 2` |
    /// | 3     | `base_delay × 4` |
    #[must_use]
    pub fn base_backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Back-off before retry number `retry` with random jitter applied.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let max_jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter_ms = rand::random_range(0..=max_jitter_ms);
        self.base_backoff(retry)
            .saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// Per-request state carried across the attempts of one fetch.
///
/// The correlation id is fixed for the lifetime of the context; only the
/// attempt counter moves.
#[derive(Debug, Clone)]
pub struct RetryContext {
    attempt: u32,
    correlation_id: String,
    started: Instant,
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryContext {
    #[must_use]
    pub fn new() -> Self {
        let mut correlation_id = uuid::Uuid::new_v4().simple().to_string();
        correlation_id.truncate(16);
        Self {
            attempt: 0,
            correlation_id,
            started: Instant::now(),
        }
    }

    /// Number of attempts started so far.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }
}

/// Caller-side stop signals for a fetch: a cancellation token and an
/// optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// No deadline and a token nobody else holds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline to `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Runs `fut` unless the token fires or the deadline passes first.
    ///
    /// Cancellation is checked before the deadline, and both before `fut`.
    pub(crate) async fn guard<F>(&self, fut: F) -> Result<F::Output, RoadStatusError>
    where
        F: Future,
    {
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(RoadStatusError::Cancelled),
            () = expiry => Err(RoadStatusError::Timeout),
            output = fut => Ok(output),
        }
    }
}

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - [`RoadStatusError::Network`]: connection refused, reset, DNS failure.
/// - [`RoadStatusError::Upstream`] with HTTP 429 or 5xx.
///
/// **Not retriable:** every other variant, including `Upstream` with any
/// other status, [`RoadStatusError::Timeout`] and [`RoadStatusError::Cancelled`].
pub(crate) fn is_retriable(err: &RoadStatusError) -> bool {
    match err {
        RoadStatusError::Network { .. } => true,
        RoadStatusError::Upstream { status, .. } => *status == 429 || (500..600).contains(status),
        RoadStatusError::InvalidRoadId
        | RoadStatusError::UnknownRoad { .. }
        | RoadStatusError::Timeout
        | RoadStatusError::Cancelled
        | RoadStatusError::InvalidResponseFormat { .. }
        | RoadStatusError::ClientBuild(_)
        | RoadStatusError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// transient errors, sleeping with `sleep` between attempts.
///
/// Production callers pass `tokio::time::sleep`; tests pass a recorder.
/// When retries run out the last error is returned unchanged.
///
/// # Errors
///
/// Returns the operation's error when it is not retriable or retries are
/// exhausted, [`RoadStatusError::Cancelled`] if the token fires, and
/// [`RoadStatusError::Timeout`] if the deadline passes.
pub(crate) async fn retry_with_backoff<T, F, Fut, S, SFut>(
    policy: &RetryPolicy,
    ctx: &mut RetryContext,
    cancellation: &Cancellation,
    mut sleep: S,
    mut operation: F,
) -> Result<T, RoadStatusError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RoadStatusError>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    loop {
        let attempt = ctx.begin_attempt();
        let err = match cancellation.guard(operation()).await? {
            Ok(value) => {
                tracing::debug!(attempt, "road status request succeeded");
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retriable(&err) || attempt > policy.max_retries {
            return Err(err);
        }

        let delay = policy.backoff(attempt);
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(
            attempt,
            max_retries = policy.max_retries,
            delay_ms,
            correlation_id = %ctx.correlation_id(),
            error = %err,
            "transient road status error, retrying after back-off"
        );
        cancellation.guard(sleep(delay)).await?;
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
