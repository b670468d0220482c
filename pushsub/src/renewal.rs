//! Renewal scheduling.
//!
//! A subscription owns at most one [`RenewalTask`]. The task sleeps until
//! `renewal_handicap` before expiration and then runs the renewal future.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Time to wait before renewing a grant that expires at `expiration`.
///
/// Clamped to zero, so a grant that expires within the handicap (or has
/// already expired) is renewed immediately.
pub fn renewal_delay(expiration: DateTime<Utc>, now: DateTime<Utc>, handicap: Duration) -> Duration {
    (expiration - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .saturating_sub(handicap)
}

/// A scheduled renewal.
///
/// Dropping a `RenewalTask` detaches it; only [`cancel`](Self::cancel) stops
/// it. The firing task clears its own slot by dropping, which must not
/// abort the request it is about to make.
#[derive(Debug)]
pub(crate) struct RenewalTask {
    task: JoinHandle<()>,
    due_at: DateTime<Utc>,
}

impl RenewalTask {
    /// Spawn `renew` to run after `delay`
    pub(crate) fn schedule<F>(delay: Duration, renew: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let due_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        // Deadline is fixed here, not when the task is first polled
        let deadline = Instant::now() + delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            renew.await;
        });

        Self { task, due_at }
    }

    /// Wall-clock time the renewal is due
    pub(crate) fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    /// Abort the renewal if it has not fired yet
    pub(crate) fn cancel(self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_delay_is_expiry_minus_handicap() {
        let delay = renewal_delay(at(60), at(0), Duration::from_secs(30));
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn test_delay_clamps_when_inside_handicap() {
        assert_eq!(
            renewal_delay(at(10), at(0), Duration::from_secs(30)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_delay_clamps_when_already_expired() {
        assert_eq!(
            renewal_delay(at(0), at(5), Duration::from_secs(30)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let _task = RenewalTask::schedule(Duration::from_secs(30), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let task = RenewalTask::schedule(Duration::from_secs(30), async move {
            flag.store(true, Ordering::SeqCst);
        });

        task.cancel();
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    proptest! {
        #[test]
        fn prop_delay_never_exceeds_time_to_expiry(
            expiry in -3600i64..3600,
            handicap in 0u64..120,
        ) {
            let delay = renewal_delay(at(expiry), at(0), Duration::from_secs(handicap));
            let until_expiry = Duration::from_secs(expiry.max(0) as u64);
            prop_assert!(delay <= until_expiry);
            prop_assert_eq!(delay, until_expiry.saturating_sub(Duration::from_secs(handicap)));
        }
    }
}
