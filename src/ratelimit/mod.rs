//! Shared request-budget accounting
//!
//! Every upstream call is admitted against a named [`RateWindow`] through a
//! [`RateAccountant`]. Two implementations exist:
//!
//! - [`RedisRateAccountant`]: a sliding-window log kept in a Redis sorted set,
//!   evaluated atomically by a Lua script against the Redis server clock, so
//!   any number of processes can share one budget.
//! - [`InMemoryRateAccountant`]: the same log held in process memory, for
//!   single-process runs and tests.
//!
//! Admission never fails hard: when the counter store is unreachable the
//! Redis accountant admits the call and logs a warning.

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryRateAccountant;
pub use redis_store::RedisRateAccountant;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::models::RateWindow;

/// Budget accounting shared by all callers of one key
#[async_trait]
pub trait RateAccountant: Send + Sync {
    /// Record a call if it fits in the window; `false` means the caller must wait
    async fn try_acquire(&self, window: &RateWindow) -> bool;

    /// Calls still admissible in the current window, without consuming any
    async fn remaining_capacity(&self, window: &RateWindow) -> u64;

    /// Forget every recorded call for `key`; `true` if anything was removed
    async fn reset(&self, key: &str) -> bool;

    /// Name of the counter store, for status output
    fn backend(&self) -> &'static str;
}

/// Shared handle injected into the fetch client and the admin API
pub type SharedAccountant = Arc<dyn RateAccountant>;

/// Wait until `window` admits one call, sleeping `delay` between denials.
///
/// Returns how many times admission was denied before it succeeded.
pub async fn acquire_with_wait(
    accountant: &dyn RateAccountant,
    window: &RateWindow,
    delay: Duration,
) -> u32 {
    let mut denials = 0u32;

    while !accountant.try_acquire(window).await {
        denials = denials.saturating_add(1);
        if denials == 1 {
            tracing::info!(
                key = %window.key,
                limit = window.limit,
                window_secs = window.window_secs,
                delay_ms = delay.as_millis() as u64,
                "Rate budget exhausted, waiting for admission"
            );
        } else {
            tracing::debug!(key = %window.key, denials, "Still waiting for admission");
        }
        tokio::time::sleep(delay).await;
    }

    denials
}

/// Budget status of one key as shown by the admin surfaces
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BudgetStatus {
    pub key: String,
    pub limit: u32,
    pub window_secs: u64,
    pub remaining: u64,
    pub used: u64,
}

/// Read the budget status of `window` without consuming capacity
pub async fn budget_status(accountant: &dyn RateAccountant, window: &RateWindow) -> BudgetStatus {
    let remaining = accountant
        .remaining_capacity(window)
        .await
        .min(u64::from(window.limit));

    BudgetStatus {
        key: window.key.clone(),
        limit: window.limit,
        window_secs: window.window_secs,
        remaining,
        used: u64::from(window.limit) - remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_acquire_with_wait_counts_denials() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("wait", 1, 1);

        assert!(accountant.try_acquire(&window).await);

        // Budget is exhausted until the one-second window slides past the first call
        let denials =
            acquire_with_wait(&accountant, &window, Duration::from_millis(300)).await;
        assert_eq!(denials, 4);
    }

    #[tokio::test]
    async fn test_budget_status_for_fresh_key() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("fresh", 10, 60);

        let status = budget_status(&accountant, &window).await;
        assert_eq!(status.remaining, 10);
        assert_eq!(status.used, 0);
        assert_eq!(status.remaining + status.used, u64::from(window.limit));
    }

    #[tokio::test]
    async fn test_budget_status_after_calls() {
        let accountant = InMemoryRateAccountant::new();
        let window = RateWindow::new("busy", 10, 60);

        for _ in 0..3 {
            assert!(accountant.try_acquire(&window).await);
        }

        let status = budget_status(&accountant, &window).await;
        assert_eq!(status.used, 3);
        assert_eq!(status.remaining, 7);
    }
}
