//! RetryLoop - poll a unit of work until it is done, fails, or runs out of time.
//!
//! A unit of work reports one of three things per attempt:
//!
//! - [`Attempt::Done`]: finished, the loop returns the value,
//! - [`Attempt::Retry`]: the app is not there yet, poll again later,
//! - [`Attempt::Fatal`]: stop now, the error is returned unchanged.
//!
//! Attempts run strictly one after another. The wait between attempts is
//! clamped to the remaining time, and an attempt still running at the
//! deadline is dropped, so the loop gives up no earlier than the timeout and
//! no later than one poll interval after it.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

use crate::result::{SondaError, SondaResult};

/// Default polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default timeout for UI visibility checks (10 seconds)
pub const DEFAULT_SHORT_TIMEOUT_MS: u64 = 10_000;

/// Default timeout for network-bound operations (60 seconds)
pub const DEFAULT_LONG_TIMEOUT_MS: u64 = 60_000;

/// Result of a single attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// Finished with a value
    Done(T),
    /// Not ready yet; the reason is kept for the timeout report
    Retry(String),
    /// Terminal failure, never retried
    Fatal(SondaError),
}

impl<T> Attempt<T> {
    /// Not ready yet
    #[must_use]
    pub fn retry(reason: impl Into<String>) -> Self {
        Self::Retry(reason.into())
    }

    /// Collapse a fallible attempt; errors become [`Attempt::Fatal`]
    #[must_use]
    pub fn flatten(result: SondaResult<Self>) -> Self {
        result.unwrap_or_else(Self::Fatal)
    }
}

impl<T> From<SondaError> for Attempt<T> {
    fn from(err: SondaError) -> Self {
        Self::Fatal(err)
    }
}

/// Time budget for one retry loop
///
/// Owned by a single action and consumed by [`RetryLoop::run`].
#[derive(Debug)]
pub struct Deadline {
    timeout: Duration,
    poll_interval: Duration,
    on_timeout: Option<SondaError>,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_SHORT_TIMEOUT_MS),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        )
    }
}

impl Deadline {
    /// Create a deadline
    #[must_use]
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            on_timeout: None,
        }
    }

    /// Replace the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Error to raise instead of the generic timeout
    #[must_use]
    pub fn with_timeout_error(mut self, err: SondaError) -> Self {
        self.on_timeout = Some(err);
        self
    }

    /// Total timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Interval between attempts
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Statistics of a finished loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryStats {
    /// Attempts made
    pub attempts: u32,
    /// Time spent
    pub elapsed: Duration,
}

/// A named retry loop
#[derive(Debug)]
pub struct RetryLoop {
    action: String,
    deadline: Deadline,
}

impl RetryLoop {
    /// Create a loop for `action` (used in logs and the timeout error)
    #[must_use]
    pub fn new(action: impl Into<String>, deadline: Deadline) -> Self {
        Self {
            action: action.into(),
            deadline,
        }
    }

    /// Run `unit` until it is done, fails, or the deadline passes
    pub async fn run<T, F, Fut>(self, unit: F) -> SondaResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        self.run_with_stats(unit).await.map(|(value, _)| value)
    }

    /// Like [`RetryLoop::run`], also reporting how many attempts were made
    pub async fn run_with_stats<T, F, Fut>(self, mut unit: F) -> SondaResult<(T, RetryStats)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let Self { action, deadline } = self;
        let start = Instant::now();
        let until = start + deadline.timeout;
        let mut attempts = 0_u32;
        let mut last: Option<String> = None;

        loop {
            attempts += 1;

            let Ok(attempt) = timeout_at(until, unit()).await else {
                let ms = deadline.timeout.as_millis() as u64;
                warn!(%action, attempts, timeout_ms = ms, last = ?last, "attempt cut off at deadline");
                return Err(deadline
                    .on_timeout
                    .unwrap_or_else(|| SondaError::Timeout { action, ms, last }));
            };

            match attempt {
                Attempt::Done(value) => {
                    let stats = RetryStats {
                        attempts,
                        elapsed: start.elapsed(),
                    };
                    debug!(%action, attempts, elapsed_ms = stats.elapsed.as_millis() as u64, "done");
                    return Ok((value, stats));
                }
                Attempt::Fatal(err) => {
                    debug!(%action, attempts, error = %err, "fatal");
                    return Err(err);
                }
                Attempt::Retry(reason) => {
                    debug!(%action, attempts, %reason, "not ready");
                    last = Some(reason);
                }
            }

            let now = Instant::now();
            if now >= until {
                let ms = deadline.timeout.as_millis() as u64;
                warn!(%action, attempts, timeout_ms = ms, last = ?last, "timed out");
                return Err(deadline
                    .on_timeout
                    .unwrap_or_else(|| SondaError::Timeout { action, ms, last }));
            }

            sleep(deadline.poll_interval.min(until - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn deadline(timeout_ms: u64, poll_ms: u64) -> Deadline {
        Deadline::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(poll_ms),
        )
    }

    mod deadline_tests {
        use super::*;

        #[test]
        fn test_default() {
            let d = Deadline::default();
            assert_eq!(d.timeout(), Duration::from_millis(DEFAULT_SHORT_TIMEOUT_MS));
            assert_eq!(
                d.poll_interval(),
                Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
            );
        }

        #[test]
        fn test_builder() {
            let d = Deadline::default()
                .with_timeout(Duration::from_secs(60))
                .with_poll_interval(Duration::from_millis(100));
            assert_eq!(d.timeout(), Duration::from_secs(60));
            assert_eq!(d.poll_interval(), Duration::from_millis(100));
        }
    }

    mod loop_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_done_immediately() {
            let (value, stats) = RetryLoop::new("noop", deadline(1000, 100))
                .run_with_stats(|| async { Attempt::Done(7) })
                .await
                .unwrap();
            assert_eq!(value, 7);
            assert_eq!(stats.attempts, 1);
            assert_eq!(stats.elapsed, Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_polls_after_success() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);

            let value = RetryLoop::new("eventually", deadline(5000, 100))
                .run(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 {
                            Attempt::retry("not yet")
                        } else {
                            Attempt::Done(n)
                        }
                    }
                })
                .await
                .unwrap();

            assert_eq!(value, 3);
            tokio::time::sleep(Duration::from_secs(10)).await;
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_succeeds_when_condition_turns_true_before_timeout() {
            let start = Instant::now();
            let ready_at = start + Duration::from_millis(1250);

            let (_, stats) = RetryLoop::new("becomes visible", deadline(2000, 500))
                .run_with_stats(|| async move {
                    if Instant::now() >= ready_at {
                        Attempt::Done(())
                    } else {
                        Attempt::retry("Element not found")
                    }
                })
                .await
                .unwrap();

            // polls at 0, 500, 1000, 1500
            assert_eq!(stats.attempts, 4);
            assert_eq!(stats.elapsed, Duration::from_millis(1500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_bounds() {
            for (timeout_ms, poll_ms) in [(1000, 300), (1000, 250), (50, 500), (0, 100)] {
                let start = Instant::now();
                let err = RetryLoop::new("never", deadline(timeout_ms, poll_ms))
                    .run(|| async { Attempt::<()>::retry("Element not found") })
                    .await
                    .unwrap_err();
                let elapsed = start.elapsed();

                assert!(elapsed >= Duration::from_millis(timeout_ms));
                assert!(elapsed <= Duration::from_millis(timeout_ms + poll_ms));
                match err {
                    SondaError::Timeout { action, ms, last } => {
                        assert_eq!(action, "never");
                        assert_eq!(ms, timeout_ms);
                        assert_eq!(last.as_deref(), Some("Element not found"));
                    }
                    other => panic!("unexpected error {other:?}"),
                }
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_caller_supplied_timeout_error() {
            let err = RetryLoop::new(
                "cron",
                deadline(100, 50).with_timeout_error(SondaError::expectation(
                    "Forced cron tasks in the app took too long to complete",
                )),
            )
            .run(|| async { Attempt::<()>::retry("pending") })
            .await
            .unwrap_err();

            assert!(matches!(err, SondaError::Expectation { ref message } if message.contains("cron")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_hung_attempt_is_cut_off_at_deadline() {
            let start = Instant::now();
            let err = RetryLoop::new("load more items", deadline(1000, 500))
                .run(|| async {
                    sleep(Duration::from_secs(30)).await;
                    Attempt::<()>::retry("still not there")
                })
                .await
                .unwrap_err();

            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(1000));
            assert!(elapsed <= Duration::from_millis(1500));
            match err {
                SondaError::Timeout { action, ms, last } => {
                    assert_eq!(action, "load more items");
                    assert_eq!(ms, 1000);
                    assert!(last.is_none());
                }
                other => panic!("unexpected error {other:?}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_hung_attempt_keeps_last_reason_and_custom_error() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);

            let err = RetryLoop::new(
                "loading",
                deadline(1000, 400)
                    .with_timeout_error(SondaError::expectation("Loading took too long")),
            )
            .run(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Attempt::<()>::retry("spinner visible")
                    } else {
                        sleep(Duration::from_secs(60)).await;
                        Attempt::Done(())
                    }
                }
            })
            .await
            .unwrap_err();

            assert_eq!(calls.load(Ordering::SeqCst), 2);
            assert!(matches!(err, SondaError::Expectation { ref message }
                if message == "Loading took too long"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_hung_attempt_reports_last_reason() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);

            let err = RetryLoop::new("find", deadline(1000, 400))
                .run(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            Attempt::<()>::retry("Element not found")
                        } else {
                            std::future::pending().await
                        }
                    }
                })
                .await
                .unwrap_err();

            assert!(matches!(err, SondaError::Timeout { ref last, .. }
                if last.as_deref() == Some("Element not found")));
        }

        #[tokio::test(start_paused = true)]
        async fn test_fatal_aborts_without_retry() {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&calls);
            let start = Instant::now();

            let err = RetryLoop::new("fatal", deadline(5000, 100))
                .run(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Attempt::<()>::Fatal(SondaError::protocol("press", "garbage")) }
                })
                .await
                .unwrap_err();

            assert!(matches!(err, SondaError::Protocol { .. }));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(start.elapsed(), Duration::ZERO);
        }

        #[test]
        fn test_flatten() {
            let ok: SondaResult<Attempt<u8>> = Ok(Attempt::Done(1));
            assert!(matches!(Attempt::flatten(ok), Attempt::Done(1)));

            let err: SondaResult<Attempt<u8>> = Err(SondaError::script("gone"));
            assert!(matches!(Attempt::flatten(err), Attempt::Fatal(_)));
        }
    }
}
