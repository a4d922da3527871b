use anyhow::{Context, Result};
use std::sync::Arc;

use shelfwatch::admin::{AdminServer, AppState};
use shelfwatch::config::Config;
use shelfwatch::crawler::LivenessTracker;

use super::{build_accountant, rate_windows};

/// Run the admin API on its own
///
/// Harvester liveness is per process, so `/api/harvesters` is empty here;
/// use `run --admin` to serve it alongside a harvest.
pub async fn serve(config: Config) -> Result<()> {
    let accountant = build_accountant(&config).await?;
    let liveness = Arc::new(LivenessTracker::new(config.scheduler.heartbeat_timeout_secs));
    let state = AppState::new(accountant, rate_windows(&config), liveness);

    let server = AdminServer::new(&config.admin, state).context("Failed to create admin server")?;

    println!("Starting admin server");
    println!("=====================");
    println!("  Bind address: {}", server.bind_address());
    println!(
        "  CORS: {}",
        if config.admin.enable_cors { "enabled" } else { "disabled" }
    );
    println!(
        "  Request Logging: {}",
        if config.admin.enable_request_logging {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Admin server stopped.");
    Ok(())
}
