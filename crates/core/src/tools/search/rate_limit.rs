//! Global spacing between outbound search calls.

use super::SearchError;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Serializes outbound calls and enforces a floor interval between them.
///
/// One limiter is shared by every session. A [`RateLimitPermit`] is held for
/// the duration of the provider call, so at most one call is in flight.
#[derive(Debug)]
pub struct RateLimiter {
    floor: Duration,
    last_call: Mutex<Option<Instant>>,
}

/// Exclusive right to issue one outbound call
#[derive(Debug)]
pub struct RateLimitPermit<'a> {
    _guard: MutexGuard<'a, Option<Instant>>,
    issued_at: Instant,
}

impl RateLimitPermit<'_> {
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

impl RateLimiter {
    pub fn new(floor: Duration) -> Self {
        Self {
            floor,
            last_call: Mutex::new(None),
        }
    }

    /// Wait for our turn and for the floor interval to pass
    pub async fn acquire(&self) -> RateLimitPermit<'_> {
        let mut guard = self.last_call.lock().await;
        if let Some(last) = *guard {
            let ready_at = last + self.floor;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        let issued_at = Instant::now();
        *guard = Some(issued_at);
        RateLimitPermit {
            _guard: guard,
            issued_at,
        }
    }

    /// Like [`acquire`](Self::acquire), giving up after `max_wait`
    pub async fn acquire_within(
        &self,
        max_wait: Duration,
    ) -> Result<RateLimitPermit<'_>, SearchError> {
        tokio::time::timeout(max_wait, self.acquire())
            .await
            .map_err(|_| SearchError::RateBudgetExceeded {
                waited_ms: max_wait.as_millis() as u64,
            })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        let permit = limiter.acquire().await;
        assert_eq!(permit.issued_at(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_floor() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let permit = limiter.acquire().await;
                permit.issued_at()
            }));
        }

        let mut issued = Vec::new();
        for handle in handles {
            issued.push(handle.await.unwrap());
        }
        issued.sort();

        for pair in issued.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exceeded_while_held() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let _held = limiter.acquire().await;

        let result = limiter.acquire_within(Duration::from_millis(50)).await;
        assert!(matches!(
            result,
            Err(SearchError::RateBudgetExceeded { waited_ms: 50 })
        ));
    }

    #[tokio::test]
    async fn test_second_caller_waits_for_release() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let held = limiter.acquire().await;

        let mut waiter = tokio_test::task::spawn(limiter.acquire());
        tokio_test::assert_pending!(waiter.poll());

        drop(held);
        assert!(waiter.is_woken());
        let _permit = tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_after_idle_gap() {
        let limiter = RateLimiter::new(Duration::from_millis(300));
        let first = limiter.acquire().await.issued_at();
        tokio::time::advance(Duration::from_secs(2)).await;
        let second = limiter.acquire().await.issued_at();
        assert_eq!(second - first, Duration::from_secs(2));
    }
}
