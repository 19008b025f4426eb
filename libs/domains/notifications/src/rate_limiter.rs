//! Sliding-window rate limiter for outbound vendor calls.
//!
//! Each service key keeps the timestamps of the calls admitted within the
//! trailing window. A call is admitted when fewer than `max_requests`
//! timestamps remain after pruning; otherwise the caller sleeps until the
//! oldest timestamp leaves the window and checks again.
//!
//! ```text
//!   window_ms
//! |<-------------------->|
//! |  x   x  x     x   x  |  now      (5 of max 5 admitted: wait)
//!    ^
//!    oldest: wait = window_ms - (now - oldest)
//! ```
//!
//! The prune, check and record steps for a key happen under one lock, so
//! concurrent callers can never push the effective rate past the bound.
//! Waiting never fails; the limiter only delays.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RateLimiterConfig;

type Windows = HashMap<String, VecDeque<Instant>>;

/// Per-key sliding-window limiter shared by all concurrent callers.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: Mutex<Windows>,
}

enum Admission {
    Admitted,
    Wait(Duration),
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            max_requests: config.max_requests as usize,
            window: config.window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call to `service_key` fits in the window, then record it.
    pub async fn check_and_wait_if_needed(&self, service_key: &str) {
        loop {
            let wait = match self.try_admit(service_key, Instant::now()) {
                Admission::Admitted => return,
                Admission::Wait(wait) => wait,
            };

            info!(
                service_key,
                wait_ms = wait.as_millis() as u64,
                max_requests = self.max_requests,
                "Rate limit reached, waiting for window to slide"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls still admissible for `service_key` in the current window.
    pub fn remaining_requests(&self, service_key: &str) -> usize {
        let now = Instant::now();
        let windows = self.lock();
        let used = windows
            .get(service_key)
            .map(|stamps| self.live(stamps, now).count())
            .unwrap_or(0);
        self.max_requests.saturating_sub(used)
    }

    /// Time until the oldest live call for `service_key` leaves the window.
    pub fn time_until_reset(&self, service_key: &str) -> Duration {
        let now = Instant::now();
        let windows = self.lock();
        windows
            .get(service_key)
            .and_then(|stamps| self.live(stamps, now).next())
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO)
    }

    /// Forget tracked calls for one key, or for every key when `None`.
    pub fn reset_state(&self, service_key: Option<&str>) {
        let mut windows = self.lock();
        match service_key {
            Some(key) => {
                windows.remove(key);
            }
            None => windows.clear(),
        }
        debug!(service_key = ?service_key, "Rate limiter state reset");
    }

    fn try_admit(&self, service_key: &str, now: Instant) -> Admission {
        let mut windows = self.lock();
        let stamps = windows.entry(service_key.to_string()).or_default();

        while let Some(&oldest) = stamps.front() {
            if now.duration_since(oldest) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() < self.max_requests {
            stamps.push_back(now);
            return Admission::Admitted;
        }

        match stamps.front() {
            Some(&oldest) => Admission::Wait(self.window - now.duration_since(oldest)),
            None => Admission::Wait(self.window),
        }
    }

    fn live<'a>(
        &'a self,
        stamps: &'a VecDeque<Instant>,
        now: Instant,
    ) -> impl Iterator<Item = &'a Instant> + 'a {
        stamps
            .iter()
            .filter(move |stamp| now.duration_since(**stamp) < self.window)
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig::new(max_requests, Duration::from_millis(window_ms)).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_max_without_waiting() {
        let limiter = limiter(10, 60_000);
        let start = Instant::now();

        for _ in 0..10 {
            limiter.check_and_wait_if_needed("messaging").await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.remaining_requests("messaging"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleventh_call_waits_for_window() {
        let limiter = limiter(10, 60_000);
        let start = Instant::now();

        for _ in 0..10 {
            limiter.check_and_wait_if_needed("messaging").await;
        }
        limiter.check_and_wait_if_needed("messaging").await;

        assert_eq!(start.elapsed(), Duration::from_millis(60_000));
        // the first 10 calls aged out, only the 11th is live
        assert_eq!(limiter.remaining_requests("messaging"), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_measured_from_oldest_call() {
        let limiter = limiter(2, 1_000);

        limiter.check_and_wait_if_needed("svc").await;
        tokio::time::advance(Duration::from_millis(400)).await;
        limiter.check_and_wait_if_needed("svc").await;

        let before = Instant::now();
        limiter.check_and_wait_if_needed("svc").await;
        assert_eq!(before.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 1_000);
        let start = Instant::now();

        limiter.check_and_wait_if_needed("email").await;
        limiter.check_and_wait_if_needed("messaging").await;

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.remaining_requests("email"), 0);
        assert_eq!(limiter.remaining_requests("messaging"), 0);
        assert_eq!(limiter.remaining_requests("system"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnostics_do_not_mutate() {
        let limiter = limiter(3, 1_000);
        limiter.check_and_wait_if_needed("svc").await;
        tokio::time::advance(Duration::from_millis(250)).await;

        assert_eq!(limiter.remaining_requests("svc"), 2);
        assert_eq!(limiter.remaining_requests("svc"), 2);
        assert_eq!(limiter.time_until_reset("svc"), Duration::from_millis(750));
        assert_eq!(limiter.time_until_reset("unknown"), Duration::ZERO);

        tokio::time::advance(Duration::from_millis(750)).await;
        assert_eq!(limiter.remaining_requests("svc"), 3);
        assert_eq!(limiter.time_until_reset("svc"), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_state() {
        let limiter = limiter(1, 60_000);
        limiter.check_and_wait_if_needed("a").await;
        limiter.check_and_wait_if_needed("b").await;

        limiter.reset_state(Some("a"));
        assert_eq!(limiter.remaining_requests("a"), 1);
        assert_eq!(limiter.remaining_requests("b"), 0);

        limiter.reset_state(None);
        assert_eq!(limiter.remaining_requests("b"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_respect_bound() {
        let limiter = Arc::new(limiter(5, 1_000));
        let start = Instant::now();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.check_and_wait_if_needed("shared").await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        // no trailing window may hold more than 5 admissions
        for (i, at) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .filter(|later| later.duration_since(*at) < Duration::from_millis(1_000))
                .count();
            assert!(in_window <= 5, "{in_window} calls admitted within one window");
        }
        assert_eq!(start.elapsed(), Duration::from_millis(3_000));
    }
}
