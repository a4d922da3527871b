//! Configuration management for shelfwatch
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. Every section has defaults matching the production deployment, so a
//! TOML file only needs to name the values it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::models::RateWindow;
use crate::storage::postgres::MAX_INSERT_CHUNK;
use crate::utils::{is_sql_identifier, normalize_proxy_url};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream listing API
    pub api: ApiConfig,

    /// Rotating upstream proxy used when direct requests are blocked
    pub proxy: ProxyConfig,

    /// Shared request budget
    pub rate_limit: RateLimitConfig,

    /// Redis counter store
    pub redis: RedisConfig,

    /// Batch scheduling
    pub scheduler: SchedulerConfig,

    /// PostgreSQL catalog and sink
    pub database: DatabaseConfig,

    /// Admin HTTP API
    pub admin: AdminConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Upstream listing API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Scheme and host of the listing API
    pub base_url: String,

    /// Path of the listing endpoint
    pub listing_path: String,

    /// Per-attempt request timeout in seconds
    pub request_timeout_secs: u64,

    /// Referer sent with every request
    pub referer: String,

    /// Value of the `app_client` header
    pub app_client: String,

    /// Value of the `app_version` header
    pub app_version: String,

    /// Value of the `web_app_version` header
    pub web_app_version: String,

    /// Direct attempts allowed after the first one when responses stay blocked
    pub max_blocked_retries: u32,

    /// Base backoff before a new direct attempt after a blocked proxy response
    pub blocked_backoff_ms: u64,

    /// Cap for the blocked backoff
    pub blocked_backoff_max_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api2.grofers.com"),
            listing_path: String::from("/v1/listing/widgets"),
            request_timeout_secs: 30,
            referer: String::from("https://blinkit.com/cn/chips-crisps/cid/1237/940"),
            app_client: String::from("consumer_web"),
            app_version: String::from("52434332"),
            web_app_version: String::from("1008010016"),
            max_blocked_retries: 3,
            blocked_backoff_ms: 1_000,
            blocked_backoff_max_ms: 10_000,
        }
    }
}

/// Proxy configuration. The proxy is disabled when `url` is unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy endpoint, either `host:port` or a full URL
    pub url: Option<String>,

    /// Basic-auth username
    pub username: Option<String>,

    /// Basic-auth password
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Proxy URL with an `http://` scheme added when only `host:port` was given
    pub fn endpoint(&self) -> Option<String> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(normalize_proxy_url)
    }
}

/// Which counter store backs the rate accountant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateBackend {
    /// Shared Redis sorted-set log (fleet-wide budget)
    Redis,
    /// In-process log (single process only)
    Memory,
}

impl FromStr for RateBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown rate limit backend: {other}")),
        }
    }
}

/// Shared request budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Budget key shared across the fleet
    pub key: String,

    /// Requests admitted per window
    pub limit: u32,

    /// Window length in seconds
    pub window_secs: u64,

    /// Sleep between admission attempts while the budget is exhausted
    pub admission_delay_ms: u64,

    /// Counter store
    pub backend: RateBackend,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            key: String::from("blinkit_scraper"),
            limit: 6500,
            window_secs: 60,
            admission_delay_ms: 10_000,
            backend: RateBackend::Redis,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> RateWindow {
        RateWindow::new(self.key.clone(), self.limit, self.window_secs)
    }

    pub fn admission_delay(&self) -> Duration {
        Duration::from_millis(self.admission_delay_ms)
    }
}

/// Redis counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL
    pub url: String,

    /// Maximum pooled connections
    pub pool_size: usize,

    /// Prefix of every key written by the accountant
    pub key_prefix: String,

    /// Bound on pool checkout and script execution
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://localhost:6379"),
            pool_size: 50,
            key_prefix: String::from("shelfwatch"),
            timeout_ms: 2_000,
        }
    }
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Batch scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Work items per batch
    pub batch_size: u64,

    /// Concurrent pair harvests within a batch
    pub max_concurrency: usize,

    /// Page cap per pair
    pub max_pages: u32,

    /// Seconds without a liveness beat before a harvester counts as stalled
    pub heartbeat_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            max_concurrency: 100,
            max_pages: 50,
            heartbeat_timeout_secs: 180,
        }
    }
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,

    /// Maximum pool size
    pub pool_size: usize,

    /// Table holding `store_id, lat, lon`
    pub stores_table: String,

    /// Table holding `l1_category_id, l2_category_id`
    pub categories_table: String,

    /// Append-only listings table
    pub listings_table: String,

    /// Rows per multi-row INSERT
    pub insert_chunk_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::from("postgresql://localhost/shelfwatch"),
            pool_size: 16,
            stores_table: String::from("dark_stores"),
            categories_table: String::from("categories"),
            listings_table: String::from("category_listings"),
            insert_chunk_size: 500,
        }
    }
}

/// Admin HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Socket address to bind
    pub bind_address: String,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Allow cross-origin requests
    pub enable_cors: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:8080"),
            enable_request_logging: true,
            enable_cors: false,
        }
    }
}

impl AdminConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address
            .parse()
            .with_context(|| format!("Invalid admin bind address: {}", self.bind_address))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: String) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let d = Self::default();

        let api = ApiConfig {
            base_url: env_string("SHELFWATCH_API_BASE_URL", d.api.base_url),
            listing_path: env_string("SHELFWATCH_LISTING_PATH", d.api.listing_path),
            request_timeout_secs: env_parse(
                "SHELFWATCH_REQUEST_TIMEOUT",
                d.api.request_timeout_secs,
            ),
            referer: env_string("SHELFWATCH_REFERER", d.api.referer),
            app_client: env_string("SHELFWATCH_APP_CLIENT", d.api.app_client),
            app_version: env_string("SHELFWATCH_APP_VERSION", d.api.app_version),
            web_app_version: env_string("SHELFWATCH_WEB_APP_VERSION", d.api.web_app_version),
            max_blocked_retries: env_parse(
                "SHELFWATCH_MAX_BLOCKED_RETRIES",
                d.api.max_blocked_retries,
            ),
            blocked_backoff_ms: env_parse("SHELFWATCH_BLOCKED_BACKOFF_MS", d.api.blocked_backoff_ms),
            blocked_backoff_max_ms: env_parse(
                "SHELFWATCH_BLOCKED_BACKOFF_MAX_MS",
                d.api.blocked_backoff_max_ms,
            ),
        };

        let proxy = ProxyConfig {
            url: std::env::var("PROXY_URL")
                .or_else(|_| std::env::var("PROXY_DNS"))
                .ok()
                .filter(|v| !v.trim().is_empty()),
            username: std::env::var("PROXY_USERNAME").ok(),
            password: std::env::var("PROXY_PASSWORD").ok(),
        };

        let backend = match std::env::var("SHELFWATCH_RATE_BACKEND") {
            Ok(v) => v
                .parse::<RateBackend>()
                .map_err(anyhow::Error::msg)
                .context("Invalid SHELFWATCH_RATE_BACKEND")?,
            Err(_) => d.rate_limit.backend,
        };

        let rate_limit = RateLimitConfig {
            key: env_string("SHELFWATCH_RATE_LIMIT_KEY", d.rate_limit.key),
            limit: env_parse("SHELFWATCH_RATE_LIMIT", d.rate_limit.limit),
            window_secs: env_parse("SHELFWATCH_RATE_WINDOW_SECS", d.rate_limit.window_secs),
            admission_delay_ms: env_parse(
                "SHELFWATCH_ADMISSION_DELAY_MS",
                d.rate_limit.admission_delay_ms,
            ),
            backend,
        };

        let redis = RedisConfig {
            url: env_string("REDIS_URL", d.redis.url),
            pool_size: env_parse("SHELFWATCH_REDIS_POOL_SIZE", d.redis.pool_size),
            key_prefix: env_string("SHELFWATCH_REDIS_PREFIX", d.redis.key_prefix),
            timeout_ms: env_parse("SHELFWATCH_REDIS_TIMEOUT_MS", d.redis.timeout_ms),
        };

        let scheduler = SchedulerConfig {
            batch_size: env_parse("SHELFWATCH_BATCH_SIZE", d.scheduler.batch_size),
            max_concurrency: env_parse("SHELFWATCH_MAX_CONCURRENCY", d.scheduler.max_concurrency),
            max_pages: env_parse("SHELFWATCH_MAX_PAGES", d.scheduler.max_pages),
            heartbeat_timeout_secs: env_parse(
                "SHELFWATCH_HEARTBEAT_TIMEOUT",
                d.scheduler.heartbeat_timeout_secs,
            ),
        };

        let database = DatabaseConfig {
            url: std::env::var("POSTGRES_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .unwrap_or(d.database.url),
            pool_size: env_parse("SHELFWATCH_DB_POOL_SIZE", d.database.pool_size),
            stores_table: env_string("SHELFWATCH_STORES_TABLE", d.database.stores_table),
            categories_table: env_string(
                "SHELFWATCH_CATEGORIES_TABLE",
                d.database.categories_table,
            ),
            listings_table: env_string("SHELFWATCH_LISTINGS_TABLE", d.database.listings_table),
            insert_chunk_size: env_parse(
                "SHELFWATCH_INSERT_CHUNK_SIZE",
                d.database.insert_chunk_size,
            ),
        };

        let admin = AdminConfig {
            bind_address: env_string("SHELFWATCH_ADMIN_ADDR", d.admin.bind_address),
            enable_request_logging: env_parse(
                "SHELFWATCH_ADMIN_REQUEST_LOGGING",
                d.admin.enable_request_logging,
            ),
            enable_cors: env_parse("SHELFWATCH_ADMIN_CORS", d.admin.enable_cors),
        };

        let logging = LoggingConfig {
            level: env_string("SHELFWATCH_LOG_LEVEL", d.logging.level),
            format: env_string("SHELFWATCH_LOG_FORMAT", d.logging.format),
        };

        Ok(Self {
            api,
            proxy,
            rate_limit,
            redis,
            scheduler,
            database,
            admin,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise from the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid api.base_url: {}", self.api.base_url))?;

        if !self.api.listing_path.starts_with('/') {
            anyhow::bail!("api.listing_path must start with '/'");
        }

        if self.api.request_timeout_secs == 0 {
            anyhow::bail!("api.request_timeout_secs must be greater than 0");
        }

        if let Some(endpoint) = self.proxy.endpoint() {
            let parsed = url::Url::parse(&endpoint)
                .with_context(|| format!("Invalid proxy endpoint: {endpoint}"))?;
            if parsed.host_str().is_none() {
                anyhow::bail!("proxy endpoint has no host: {endpoint}");
            }
        }

        if self.rate_limit.key.trim().is_empty() {
            anyhow::bail!("rate_limit.key must not be empty");
        }

        if self.rate_limit.limit == 0 {
            anyhow::bail!("rate_limit.limit must be greater than 0");
        }

        if self.rate_limit.window_secs == 0 {
            anyhow::bail!("rate_limit.window_secs must be greater than 0");
        }

        if self.rate_limit.backend == RateBackend::Redis && self.redis.pool_size == 0 {
            anyhow::bail!("redis.pool_size must be greater than 0");
        }

        if self.scheduler.batch_size == 0 {
            anyhow::bail!("scheduler.batch_size must be greater than 0");
        }

        if self.scheduler.max_concurrency == 0 {
            anyhow::bail!("scheduler.max_concurrency must be greater than 0");
        }

        if self.scheduler.max_pages == 0 {
            anyhow::bail!("scheduler.max_pages must be greater than 0");
        }

        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be greater than 0");
        }

        if self.database.insert_chunk_size == 0 {
            anyhow::bail!("database.insert_chunk_size must be greater than 0");
        }

        if self.database.insert_chunk_size > MAX_INSERT_CHUNK {
            anyhow::bail!(
                "database.insert_chunk_size must be at most {} (PostgreSQL bind parameter limit)",
                MAX_INSERT_CHUNK
            );
        }

        for (field, table) in [
            ("database.stores_table", &self.database.stores_table),
            ("database.categories_table", &self.database.categories_table),
            ("database.listings_table", &self.database.listings_table),
        ] {
            if !is_sql_identifier(table) {
                anyhow::bail!("{field} is not a valid table name: {table}");
            }
        }

        self.admin.socket_addr()?;

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}
