use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfwatch::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "shelfwatch",
    version,
    about = "Quick-commerce catalog harvester with a shared rate budget",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (environment variables are used otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch and print its report
    RunBatch {
        /// Zero-based batch index
        #[arg(short, long)]
        batch_index: u64,
    },

    /// Run batches until every pair has been harvested
    Run {
        /// Batch index to start from (overrides the checkpoint)
        #[arg(long)]
        from: Option<u64>,

        /// Cursor checkpoint file for resuming an interrupted run
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Serve the admin API while running
        #[arg(long, default_value = "false")]
        admin: bool,
    },

    /// Harvest a single (store, category) pair
    Harvest {
        /// Dark store id
        #[arg(long)]
        store: String,

        /// Store latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Store longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Level-1 category id
        #[arg(long)]
        l1: String,

        /// Level-2 category id
        #[arg(long)]
        l2: String,

        /// Print records instead of writing them to PostgreSQL
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Inspect or reset the shared rate budget
    RateLimit {
        #[command(subcommand)]
        action: RateLimitAction,
    },

    /// Start the admin API server
    Serve,
}

#[derive(Subcommand)]
enum RateLimitAction {
    /// Show remaining budget
    Status {
        /// Budget key (all configured keys when omitted)
        key: Option<String>,
    },

    /// Clear recorded admissions
    Reset {
        /// Budget key (the configured key when omitted)
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing/logging
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    shelfwatch::metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to initialize metrics: {e}"))?;

    tracing::info!("shelfwatch starting");

    match cli.command {
        Commands::RunBatch { batch_index } => {
            tracing::info!(batch_index, "Starting run-batch command");
            commands::run_batch(config, batch_index).await?;
        }

        Commands::Run {
            from,
            checkpoint,
            admin,
        } => {
            tracing::info!(
                from = ?from,
                checkpoint = ?checkpoint,
                admin,
                "Starting run command"
            );
            commands::run(config, from, checkpoint, admin).await?;
        }

        Commands::Harvest {
            store,
            lat,
            lon,
            l1,
            l2,
            dry_run,
        } => {
            tracing::info!(
                store = %store,
                l1 = %l1,
                l2 = %l2,
                dry_run,
                "Starting harvest command"
            );
            let pair = commands::PairArgs {
                store_id: store,
                lat,
                lon,
                l1_id: l1,
                l2_id: l2,
            };
            commands::harvest(config, pair, dry_run).await?;
        }

        Commands::RateLimit { action } => match action {
            RateLimitAction::Status { key } => {
                commands::rate_limit_status(config, key).await?;
            }
            RateLimitAction::Reset { key } => {
                commands::rate_limit_reset(config, key).await?;
            }
        },

        Commands::Serve => {
            commands::serve(config).await?;
        }
    }

    tracing::info!("shelfwatch completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => tracing_subscriber::EnvFilter::new("shelfwatch=debug,info"),
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!("shelfwatch={level},warn"))
            .context("Invalid log level")?,
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
