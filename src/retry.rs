//! Bounded retry for store calls that fail on transient connectivity problems.
//!
//! A [`RetryableOperation`] runs a zero-argument async unit of work and re-runs
//! it while the failure is classified as [`RetryClass::Transient`] and the
//! attempt budget is not spent. Backoff is linear: after failed attempt `n`
//! the operation waits `base_delay * n` before attempt `n + 1`.
//!
//! The error value is never wrapped. Whatever the last attempt failed with is
//! what the caller receives.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Error text fragments that identify a transient connectivity failure.
///
/// Used only for errors that carry no typed classification.
pub const TRANSIENT_MESSAGE_MARKERS: [&str; 3] = [
    "Can't reach database server",
    "Connection terminated",
    "Connection refused",
];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    Transient,
    Terminal,
}

/// Classifies an error message with the substring heuristic.
pub fn classify_message(message: &str) -> RetryClass {
    if TRANSIENT_MESSAGE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        RetryClass::Transient
    } else {
        RetryClass::Terminal
    }
}

/// Errors that know whether retrying them can help.
pub trait Retryable {
    fn retry_class(&self) -> RetryClass;

    fn is_transient(&self) -> bool {
        self.retry_class() == RetryClass::Transient
    }
}

impl Retryable for anyhow::Error {
    fn retry_class(&self) -> RetryClass {
        if let Some(io) = self.downcast_ref::<std::io::Error>() {
            return io.retry_class();
        }
        classify_message(&format!("{self:#}"))
    }
}

impl Retryable for std::io::Error {
    fn retry_class(&self) -> RetryClass {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe => RetryClass::Transient,
            _ => classify_message(&self.to_string()),
        }
    }
}

/// Attempt budget and backoff unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff unit in milliseconds.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Budget actually enforced; a zero budget still runs the work once.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_delay().saturating_mul(attempt)
    }
}

/// Where the operation suspends between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a single attempt after classification.
#[derive(Debug)]
pub enum AttemptOutcome<T, E> {
    Succeeded(T),
    TransientFailure(E),
    TerminalFailure(E),
}

impl<T, E: Retryable> AttemptOutcome<T, E> {
    pub fn classify(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Succeeded(value),
            Err(err) => match err.retry_class() {
                RetryClass::Transient => Self::TransientFailure(err),
                RetryClass::Terminal => Self::TerminalFailure(err),
            },
        }
    }
}

#[derive(Clone)]
pub struct RetryableOperation {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryableOperation {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl std::fmt::Debug for RetryableOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableOperation")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryableOperation {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.policy.effective_max_attempts();
        let mut attempt = 1;

        loop {
            match AttemptOutcome::classify(operation().await) {
                AttemptOutcome::Succeeded(value) => {
                    if attempt > 1 {
                        debug!(attempt, "store call succeeded after retry");
                    }
                    return Ok(value);
                }
                AttemptOutcome::TerminalFailure(err) => {
                    debug!(attempt, error = %err, "store call failed with terminal error");
                    return Err(err);
                }
                AttemptOutcome::TransientFailure(err) if attempt >= max_attempts => {
                    error!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "store call still failing after final attempt"
                    );
                    return Err(err);
                }
                AttemptOutcome::TransientFailure(err) => {
                    let backoff = self.policy.backoff_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient store failure, retrying"
                    );
                    self.sleeper.sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Runs `operation` with the default policy (3 attempts, 1s linear backoff).
pub async fn with_retry<T, E, F, Fut>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    RetryableOperation::default().run(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn recording(policy: RetryPolicy) -> (RetryableOperation, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let op = RetryableOperation::new(policy).with_sleeper(sleeper.clone());
        (op, sleeper)
    }

    #[test]
    fn classifies_known_markers_as_transient() {
        assert_eq!(
            classify_message("Can't reach database server at `db:5432`"),
            RetryClass::Transient
        );
        assert_eq!(
            classify_message("error: Connection terminated unexpectedly"),
            RetryClass::Transient
        );
        assert_eq!(
            classify_message("connect ECONNREFUSED: Connection refused"),
            RetryClass::Transient
        );
        assert_eq!(classify_message("invalid syntax"), RetryClass::Terminal);
        assert_eq!(classify_message("connection refused"), RetryClass::Terminal);
    }

    #[test]
    fn io_errors_classify_by_kind() {
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(refused.is_transient());

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(!denied.is_transient());
    }

    #[test]
    fn context_wrapped_errors_classify_by_root_cause() {
        let wrapped = anyhow!("Connection refused").context("saving ui feedback");
        assert_eq!(wrapped.retry_class(), RetryClass::Transient);

        let wrapped = anyhow!("invalid syntax").context("saving ui feedback");
        assert_eq!(wrapped.retry_class(), RetryClass::Terminal);
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2_000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(3_000));
        assert!(policy.backoff_for(3) > policy.backoff_for(2));
    }

    #[tokio::test]
    async fn succeeds_after_two_refused_connections() {
        let (op, sleeper) = recording(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result = op
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(anyhow!("Connection refused"))
                    } else {
                        Ok("saved")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "saved");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
        );
    }

    #[tokio::test]
    async fn terminal_error_is_not_retried() {
        let (op, sleeper) = recording(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = op
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("invalid syntax")) }
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "invalid syntax");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn exhausted_budget_returns_last_error() {
        let (op, sleeper) = recording(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = op
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(anyhow!("Connection terminated (attempt {n})")) }
            })
            .await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Connection terminated (attempt 3)"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn returns_on_first_success_without_delay() {
        let (op, sleeper) = recording(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let value = op
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, anyhow::Error>(42) }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn terminal_error_after_transient_stops_immediately() {
        let (op, sleeper) = recording(RetryPolicy::new(5, Duration::from_millis(10)));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = op
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err(anyhow!("Can't reach database server"))
                    } else {
                        Err(anyhow!("unique constraint violated"))
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "unique constraint violated");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(10)]);
    }

    #[tokio::test]
    async fn custom_budget_bounds_invocations() {
        let (op, sleeper) = recording(RetryPolicy::default());
        let op = op.with_max_attempts(5);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = op
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("Connection refused")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            sleeper.delays(),
            (1..=4)
                .map(|n| Duration::from_millis(1_000 * n))
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn zero_budget_still_runs_once() {
        let (op, sleeper) = recording(RetryPolicy::new(0, Duration::from_millis(5)));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = op
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("Connection refused")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn invocations_do_not_share_state() {
        let (op, sleeper) = recording(RetryPolicy::default());

        let first = op.run(|| async { Ok::<_, anyhow::Error>(1) }).await.unwrap();
        let second = op.run(|| async { Ok::<_, anyhow::Error>(2) }).await.unwrap();

        assert_eq!((first, second), (1, 2));
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn concurrent_invocations_run_independently() {
        let (op, sleeper) = recording(RetryPolicy::default());
        let flaky_calls = AtomicU32::new(0);

        let flaky = op.run(|| {
            let n = flaky_calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(anyhow!("Connection refused"))
                } else {
                    Ok("flaky")
                }
            }
        });
        let steady = op.run(|| async { Ok::<_, anyhow::Error>("steady") });

        let (flaky, steady) = tokio::join!(flaky, steady);
        assert_eq!(flaky.unwrap(), "flaky");
        assert_eq!(steady.unwrap(), "steady");
        assert_eq!(flaky_calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(1_000)]);
    }

    #[tokio::test]
    async fn default_helper_returns_first_success() {
        let value = with_retry(|| async { Ok::<_, anyhow::Error>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn attempt_outcome_follows_classification() {
        let ok: AttemptOutcome<u8, anyhow::Error> = AttemptOutcome::classify(Ok(1));
        assert!(matches!(ok, AttemptOutcome::Succeeded(1)));

        let transient: AttemptOutcome<u8, _> =
            AttemptOutcome::classify(Err(anyhow!("Connection refused")));
        assert!(matches!(transient, AttemptOutcome::TransientFailure(_)));

        let terminal: AttemptOutcome<u8, _> = AttemptOutcome::classify(Err(anyhow!("boom")));
        assert!(matches!(terminal, AttemptOutcome::TerminalFailure(_)));
    }
}
