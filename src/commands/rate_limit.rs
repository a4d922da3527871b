use anyhow::{bail, Result};

use shelfwatch::config::Config;
use shelfwatch::models::RateWindow;
use shelfwatch::ratelimit::budget_status;

use super::{build_accountant, rate_windows};

fn select_windows(config: &Config, key: Option<&str>) -> Result<Vec<RateWindow>> {
    let windows = rate_windows(config);
    match key {
        None => Ok(windows),
        Some(key) => match windows.into_iter().find(|window| window.key == key) {
            Some(window) => Ok(vec![window]),
            None => bail!("Unknown rate limit key: {key}"),
        },
    }
}

/// Print remaining budget for `key`, or for every configured key
pub async fn rate_limit_status(config: Config, key: Option<String>) -> Result<()> {
    let windows = select_windows(&config, key.as_deref())?;
    let accountant = build_accountant(&config).await?;

    println!("Rate budget ({})", accountant.backend());
    println!("{:-<40}", "");
    for window in &windows {
        let status = budget_status(accountant.as_ref(), window).await;
        println!("  Key: {}", status.key);
        println!("    Limit: {} / {}s", status.limit, status.window_secs);
        println!("    Used: {}", status.used);
        println!("    Remaining: {}", status.remaining);
    }

    Ok(())
}

/// Forget all admissions recorded for `key` (the configured key by default)
pub async fn rate_limit_reset(config: Config, key: Option<String>) -> Result<()> {
    let key = key.unwrap_or_else(|| config.rate_limit.key.clone());
    select_windows(&config, Some(&key))?;
    let accountant = build_accountant(&config).await?;

    if accountant.reset(&key).await {
        tracing::info!(key = %key, "Rate budget reset");
        println!("Reset rate budget '{key}'");
    } else {
        println!("Nothing to reset for '{key}'");
    }

    Ok(())
}
