use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::oneshot;

use shelfwatch::admin::{AdminServer, AppState};
use shelfwatch::config::Config;
use shelfwatch::storage::CursorCheckpoint;

use super::{fail, rate_windows, HarvestContext};

/// One batch execution; prints the report including the continuation
pub async fn run_batch(config: Config, batch_index: u64) -> Result<()> {
    let context = HarvestContext::build(&config)
        .await
        .map_err(|e| fail("Failed to set up harvesting", e))?;

    let report = context
        .scheduler
        .run_batch(batch_index)
        .await
        .map_err(|e| fail(&format!("Batch {batch_index} failed"), e))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize batch report")?
    );
    Ok(())
}

/// Local driver: run batches until the work set is exhausted
pub async fn run(
    config: Config,
    from: Option<u64>,
    checkpoint: Option<PathBuf>,
    with_admin: bool,
) -> Result<()> {
    let context = HarvestContext::build(&config)
        .await
        .map_err(|e| fail("Failed to set up harvesting", e))?;
    let checkpoint = checkpoint.map(CursorCheckpoint::new);

    println!("Starting harvest run");
    println!("====================");
    println!("  Batch size: {}", config.scheduler.batch_size);
    println!("  Concurrency: {}", config.scheduler.max_concurrency);
    println!("  Max pages: {}", config.scheduler.max_pages);
    println!(
        "  Rate budget: {} req / {}s on '{}' ({})",
        config.rate_limit.limit,
        config.rate_limit.window_secs,
        config.rate_limit.key,
        context.accountant.backend()
    );
    if let Some(ref checkpoint) = checkpoint {
        println!("  Checkpoint: {}", checkpoint.path().display());
    }
    println!();

    let admin_shutdown = if with_admin {
        let state = AppState::new(
            context.accountant.clone(),
            rate_windows(&config),
            context.liveness.clone(),
        );
        let server = AdminServer::new(&config.admin, state).context("Failed to create admin server")?;
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.await;
            };
            if let Err(e) = server.start_with_shutdown(shutdown).await {
                tracing::error!(error = %e, "Admin server stopped");
            }
        });
        Some(tx)
    } else {
        None
    };

    let outcome = tokio::select! {
        result = context.scheduler.run_until_done(from, checkpoint.as_ref()) => Some(result),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!("Failed to wait for Ctrl+C: {}", e);
            }
            None
        }
    };

    if let Some(tx) = admin_shutdown {
        let _ = tx.send(());
    }

    match outcome {
        Some(result) => {
            let summary = result.map_err(|e| fail("Harvest run failed", e))?;
            println!("Run complete");
            println!("  Batches: {} (from {})", summary.batches, summary.first_batch);
            println!("  Pairs: {} ({} failed)", summary.pairs, summary.failed_pairs);
            println!("  Records written: {}", summary.records_written);
        }
        None => {
            println!("\nShutdown signal received, stopping...");
            if let Some(checkpoint) = checkpoint {
                println!(
                    "Resume with: shelfwatch run --checkpoint {}",
                    checkpoint.path().display()
                );
            }
        }
    }

    Ok(())
}
