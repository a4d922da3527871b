//! Redis-backed sliding-window log
//!
//! Each admitted call is a member of the sorted set
//! `{prefix}:rate-limit:sliding:{key}` scored by the Redis server time in
//! milliseconds. Eviction, counting and insertion run inside one Lua script,
//! so concurrent callers in different processes cannot both take the last
//! slot, and no caller needs a synchronized clock.

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::{AsyncCommands, Script};
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use super::RateAccountant;
use crate::config::RedisConfig;
use crate::metrics;
use crate::models::RateWindow;
use crate::utils::error::StorageError;

/// KEYS[1] = log key, ARGV = limit, window in ms, unique member.
/// Returns `{allowed, count}` where `count` includes the new entry if admitted.
const ACQUIRE_SCRIPT: &str = r#"
redis.replicate_commands()
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local t = redis.call('TIME')
local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window_ms)
local count = redis.call('ZCARD', key)
if count < limit then
  redis.call('ZADD', key, now, ARGV[3])
  redis.call('PEXPIRE', key, window_ms)
  return {1, count + 1}
end
return {0, count}
"#;

/// KEYS[1] = log key, ARGV[1] = window in ms. Counts entries inside the window.
const COUNT_SCRIPT: &str = r#"
local t = redis.call('TIME')
local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
return redis.call('ZCOUNT', KEYS[1], '(' .. (now - tonumber(ARGV[1])), '+inf')
"#;

/// Fleet-wide rate accountant
pub struct RedisRateAccountant {
    pool: Pool,
    key_prefix: String,
    timeout: Duration,
    acquire_script: Script,
    count_script: Script,
}

impl RedisRateAccountant {
    /// Build the connection pool. Connections are opened lazily, so an
    /// unreachable Redis does not prevent startup.
    pub fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let pool = PoolConfig::from_url(&config.url)
            .builder()
            .map_err(|e| StorageError::Redis(format!("Failed to create pool builder: {e}")))?
            .max_size(config.pool_size)
            .wait_timeout(Some(config.timeout()))
            .create_timeout(Some(config.timeout()))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StorageError::Redis(format!("Failed to create Redis pool: {e}")))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            timeout: config.timeout(),
            acquire_script: Script::new(ACQUIRE_SCRIPT),
            count_script: Script::new(COUNT_SCRIPT),
        })
    }

    /// Check that Redis answers PING
    pub async fn health_check(&self) -> Result<bool, StorageError> {
        let mut conn = self.pool.get().await?;
        let result: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(result == "PONG")
    }

    /// Sorted-set key holding the log for `key`
    pub fn log_key(&self, key: &str) -> String {
        format!("{}:rate-limit:sliding:{}", self.key_prefix, key)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StorageError::Redis(format!("timed out after {:?}", self.timeout)))?
    }

    async fn run_acquire(&self, window: &RateWindow) -> Result<(i64, i64), StorageError> {
        let mut conn = self.pool.get().await?;
        let reply: (i64, i64) = self
            .acquire_script
            .key(self.log_key(&window.key))
            .arg(window.limit)
            .arg(window.window_millis())
            .arg(Uuid::new_v4().to_string())
            .invoke_async(&mut *conn)
            .await?;
        Ok(reply)
    }

    async fn run_count(&self, window: &RateWindow) -> Result<u64, StorageError> {
        let mut conn = self.pool.get().await?;
        let count: u64 = self
            .count_script
            .key(self.log_key(&window.key))
            .arg(window.window_millis())
            .invoke_async(&mut *conn)
            .await?;
        Ok(count)
    }

    async fn run_reset(&self, key: &str) -> Result<i64, StorageError> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = conn.del(self.log_key(key)).await?;
        Ok(deleted)
    }
}

#[async_trait]
impl RateAccountant for RedisRateAccountant {
    async fn try_acquire(&self, window: &RateWindow) -> bool {
        match self.bounded(self.run_acquire(window)).await {
            Ok((allowed, count)) => {
                let allowed = allowed == 1;
                tracing::trace!(key = %window.key, allowed, count, "Rate budget checked");
                metrics::record_rate_limit_decision(
                    &window.key,
                    if allowed { "admitted" } else { "denied" },
                );
                allowed
            }
            Err(e) => {
                warn!(key = %window.key, error = %e, "Rate accountant unavailable, admitting call");
                metrics::record_rate_limit_decision(&window.key, "fail_open");
                true
            }
        }
    }

    async fn remaining_capacity(&self, window: &RateWindow) -> u64 {
        match self.bounded(self.run_count(window)).await {
            Ok(count) => u64::from(window.limit).saturating_sub(count),
            Err(e) => {
                warn!(key = %window.key, error = %e, "Failed to read remaining capacity");
                u64::from(window.limit)
            }
        }
    }

    async fn reset(&self, key: &str) -> bool {
        match self.bounded(self.run_reset(key)).await {
            Ok(deleted) => {
                tracing::info!(key, deleted, "Rate budget reset");
                deleted > 0
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to reset rate budget");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
