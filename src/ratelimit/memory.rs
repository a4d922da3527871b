//! In-process sliding-window log

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::RateAccountant;
use crate::metrics;
use crate::models::RateWindow;

/// Per-key log of admission instants guarded by one mutex.
///
/// Semantics match [`super::RedisRateAccountant`]: an entry counts while it
/// is younger than the window, and a call is admitted iff fewer than `limit`
/// entries survive.
#[derive(Debug, Default)]
pub struct InMemoryRateAccountant {
    logs: Mutex<HashMap<String, KeyLog>>,
}

/// Admission instants for one key and the window they were recorded under
#[derive(Debug)]
struct KeyLog {
    window: Duration,
    entries: VecDeque<Instant>,
}

impl KeyLog {
    fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(oldest) = self.entries.front() {
            if now.duration_since(*oldest) >= self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}

impl InMemoryRateAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, KeyLog>> {
        // A panic while holding the lock cannot leave the log half-updated
        self.logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RateAccountant for InMemoryRateAccountant {
    async fn try_acquire(&self, window: &RateWindow) -> bool {
        let now = Instant::now();
        let allowed = {
            let mut logs = self.lock();
            let log = logs
                .entry(window.key.clone())
                .or_insert_with(|| KeyLog::new(window.window()));
            log.window = window.window();
            log.evict_expired(now);

            if log.entries.len() < window.limit as usize {
                log.entries.push_back(now);
                true
            } else {
                false
            }
        };

        metrics::record_rate_limit_decision(
            &window.key,
            if allowed { "admitted" } else { "denied" },
        );
        allowed
    }

    async fn remaining_capacity(&self, window: &RateWindow) -> u64 {
        let now = Instant::now();
        let logs = self.lock();
        let used = logs
            .get(&window.key)
            .map(|log| {
                log.entries
                    .iter()
                    .filter(|at| now.duration_since(**at) < window.window())
                    .count() as u64
            })
            .unwrap_or(0);

        u64::from(window.limit).saturating_sub(used)
    }

    async fn reset(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock().remove(key).is_some_and(|mut log| {
            log.evict_expired(now);
            !log.entries.is_empty()
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("limit", 3, 60);

        assert!(accountant.try_acquire(&window).await);
        assert!(accountant.try_acquire(&window).await);
        assert!(accountant.try_acquire(&window).await);
        assert!(!accountant.try_acquire(&window).await);
        assert_eq!(accountant.remaining_capacity(&window).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_never_exceed_limit() {
        let accountant = Arc::new(InMemoryRateAccountant::new());
        let window = RateWindow::new("concurrent", 25, 60);

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let accountant = Arc::clone(&accountant);
                let window = window.clone();
                tokio::spawn(async move { accountant.try_acquire(&window).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("slide", 2, 10);

        assert!(accountant.try_acquire(&window).await);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(accountant.try_acquire(&window).await);
        assert!(!accountant.try_acquire(&window).await);

        // First entry leaves the window, second is still inside it
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(accountant.remaining_capacity(&window).await, 1);
        assert!(accountant.try_acquire(&window).await);
        assert!(!accountant.try_acquire(&window).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admissions_bounded_in_every_window() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("bounded", 5, 2);
        let mut admitted_at = Vec::new();

        for _ in 0..80 {
            if accountant.try_acquire(&window).await {
                admitted_at.push(Instant::now());
            }
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        for (i, start) in admitted_at.iter().enumerate() {
            let in_window = admitted_at[i..]
                .iter()
                .take_while(|at| at.duration_since(*start) < window.window())
                .count();
            assert!(in_window <= 5, "window starting at #{i} admitted {in_window}");
        }
        assert!(admitted_at.len() >= 15);
    }

    #[tokio::test]
    async fn test_remaining_capacity_does_not_consume() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("peek", 2, 60);

        for _ in 0..10 {
            assert_eq!(accountant.remaining_capacity(&window).await, 2);
        }
        assert!(accountant.try_acquire(&window).await);
        assert_eq!(accountant.remaining_capacity(&window).await, 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("reset-me", 1, 60);

        assert!(!accountant.reset("reset-me").await);
        assert!(accountant.try_acquire(&window).await);
        assert!(!accountant.try_acquire(&window).await);

        assert!(accountant.reset("reset-me").await);
        assert!(accountant.try_acquire(&window).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_of_expired_log_clears_nothing() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("stale", 2, 10);

        assert!(accountant.try_acquire(&window).await);
        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(!accountant.reset("stale").await);
        assert_eq!(accountant.remaining_capacity(&window).await, 2);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let accountant = InMemoryRateAccountant::new();
        let a = RateWindow::new("a", 1, 60);
        let b = RateWindow::new("b", 1, 60);

        assert!(accountant.try_acquire(&a).await);
        assert!(!accountant.try_acquire(&a).await);
        assert!(accountant.try_acquire(&b).await);
    }
}
