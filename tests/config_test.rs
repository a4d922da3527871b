//! Tests for config module

use serial_test::serial;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use shelfwatch::config::{Config, RateBackend};

const ENV_VARS: &[&str] = &[
    "SHELFWATCH_API_BASE_URL",
    "SHELFWATCH_RATE_LIMIT",
    "SHELFWATCH_RATE_WINDOW_SECS",
    "SHELFWATCH_RATE_BACKEND",
    "SHELFWATCH_BATCH_SIZE",
    "SHELFWATCH_MAX_PAGES",
    "REDIS_URL",
    "PROXY_URL",
    "PROXY_DNS",
    "PROXY_USERNAME",
    "PROXY_PASSWORD",
    "POSTGRES_URL",
    "DATABASE_URL",
];

fn clear_env() {
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}

#[test]
fn test_config_toml_parses() {
    let config = Config::from_file(Path::new("config.toml")).expect("config.toml should parse");
    config.validate().expect("config.toml should validate");

    assert_eq!(config.rate_limit.key, "blinkit_scraper");
    assert_eq!(config.rate_limit.limit, 6500);
    assert_eq!(config.scheduler.batch_size, 2000);
    assert_eq!(config.scheduler.max_concurrency, 100);
    assert_eq!(config.scheduler.max_pages, 50);
    assert!(!config.proxy.is_enabled());
}

#[test]
fn test_partial_file_uses_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[scheduler]\nbatch_size = 10\n\n[rate_limit]\nbackend = \"memory\"\nlimit = 5"
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.scheduler.batch_size, 10);
    assert_eq!(config.scheduler.max_concurrency, 100);
    assert_eq!(config.rate_limit.backend, RateBackend::Memory);
    assert_eq!(config.rate_limit.limit, 5);
    assert_eq!(config.rate_limit.window_secs, 60);
    assert_eq!(config.api.request_timeout_secs, 30);
}

#[test]
fn test_invalid_file_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[scheduler]\nbatch_size = 0").unwrap();
    assert!(Config::load(Some(file.path())).is_err());

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[database]\nlistings_table = \"listings; DROP TABLE x\"").unwrap();
    assert!(Config::load(Some(file.path())).is_err());

    assert!(Config::load(Some(Path::new("does-not-exist.toml"))).is_err());
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = Config::from_env().unwrap();

    assert_eq!(config.api.base_url, "https://api2.grofers.com");
    assert_eq!(config.rate_limit.backend, RateBackend::Redis);
    assert_eq!(config.rate_limit.admission_delay_ms, 10_000);
    assert_eq!(config.redis.url, "redis://localhost:6379");
    assert!(config.proxy.url.is_none());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var("SHELFWATCH_RATE_LIMIT", "120");
    std::env::set_var("SHELFWATCH_RATE_WINDOW_SECS", "10");
    std::env::set_var("SHELFWATCH_RATE_BACKEND", "memory");
    std::env::set_var("SHELFWATCH_BATCH_SIZE", "250");
    std::env::set_var("REDIS_URL", "redis://cache:6380");
    std::env::set_var("PROXY_DNS", "proxy.internal:3128");
    std::env::set_var("PROXY_USERNAME", "user");
    std::env::set_var("PROXY_PASSWORD", "pass");
    std::env::set_var("DATABASE_URL", "postgresql://db/listings");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.rate_limit.limit, 120);
    assert_eq!(config.rate_limit.window_secs, 10);
    assert_eq!(config.rate_limit.backend, RateBackend::Memory);
    assert_eq!(config.scheduler.batch_size, 250);
    assert_eq!(config.redis.url, "redis://cache:6380");
    assert_eq!(
        config.proxy.endpoint().as_deref(),
        Some("http://proxy.internal:3128")
    );
    assert_eq!(config.proxy.username.as_deref(), Some("user"));
    assert_eq!(config.database.url, "postgresql://db/listings");
    config.validate().unwrap();
}

#[test]
#[serial]
fn test_unparseable_numbers_fall_back() {
    clear_env();
    std::env::set_var("SHELFWATCH_MAX_PAGES", "lots");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.scheduler.max_pages, 50);
}

#[test]
#[serial]
fn test_invalid_backend_rejected() {
    clear_env();
    std::env::set_var("SHELFWATCH_RATE_BACKEND", "zookeeper");

    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}
