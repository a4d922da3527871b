pub mod harvest;
pub mod rate_limit;
pub mod run;
pub mod serve;

// Re-export command functions for convenience
pub use harvest::{harvest, PairArgs};
pub use rate_limit::{rate_limit_reset, rate_limit_status};
pub use run::{run, run_batch};
pub use serve::serve;

use std::sync::Arc;

use shelfwatch::config::{Config, RateBackend};
use shelfwatch::error::{Error, Result, ShelfwatchError};
use shelfwatch::crawler::{ListingFetcher, Liveness, LivenessTracker};
use shelfwatch::models::RateWindow;
use shelfwatch::ratelimit::{InMemoryRateAccountant, RedisRateAccountant, SharedAccountant};
use shelfwatch::scheduler::{BatchScheduler, HarvestActivities};
use shelfwatch::storage::PostgresStore;

/// Build the accountant selected by `rate_limit.backend`
pub async fn build_accountant(config: &Config) -> Result<SharedAccountant> {
    match config.rate_limit.backend {
        RateBackend::Redis => {
            let accountant = RedisRateAccountant::new(&config.redis)?;
            match accountant.health_check().await {
                Ok(true) => tracing::info!(url = %config.redis.url, "Connected to Redis"),
                Ok(false) | Err(_) => tracing::warn!(
                    url = %config.redis.url,
                    "Redis is not answering; admissions fail open until it does"
                ),
            }
            Ok(Arc::new(accountant))
        }
        RateBackend::Memory => {
            tracing::warn!("Using in-process rate accountant; budget is not shared across processes");
            Ok(Arc::new(InMemoryRateAccountant::new()))
        }
    }
}

/// Budget keys exposed to the admin surfaces
pub fn rate_windows(config: &Config) -> Vec<RateWindow> {
    vec![config.rate_limit.window()]
}

/// Everything a harvesting command needs, wired from one config
pub struct HarvestContext {
    pub accountant: SharedAccountant,
    pub liveness: Arc<LivenessTracker>,
    pub scheduler: BatchScheduler,
}

impl HarvestContext {
    pub async fn build(config: &Config) -> Result<Self> {
        let accountant = build_accountant(config).await?;
        let fetcher = Arc::new(ListingFetcher::new(config, Arc::clone(&accountant))?);
        let store = Arc::new(PostgresStore::connect(&config.database).await?);
        let liveness = Arc::new(LivenessTracker::new(config.scheduler.heartbeat_timeout_secs));

        let activities = HarvestActivities::new(
            store.clone(),
            store,
            fetcher,
            Arc::clone(&liveness) as Arc<dyn Liveness>,
            config.scheduler.max_pages,
        );
        let scheduler = BatchScheduler::from_config(Arc::new(activities), &config.scheduler)?;

        Ok(Self {
            accountant,
            liveness,
            scheduler,
        })
    }
}

/// Log a command failure with its category, then hand it to `main`
pub fn fail(context: &str, err: impl Into<Error>) -> anyhow::Error {
    let err = err.into();
    tracing::error!(
        category = err.category().description(),
        recoverable = err.is_recoverable(),
        error = %err,
        "{context}"
    );
    anyhow::Error::new(err).context(context.to_string())
}
