use anyhow::{Context, Result};
use std::sync::Arc;

use shelfwatch::config::Config;
use shelfwatch::crawler::{ListingFetcher, NoopLiveness};
use shelfwatch::models::{Category, DarkStore, WorkItem};
use shelfwatch::scheduler::HarvestActivities;
use shelfwatch::storage::{MemoryStore, PostgresStore};

use super::build_accountant;

/// One (store, category) pair as given on the command line
#[derive(Debug, Clone)]
pub struct PairArgs {
    pub store_id: String,
    pub lat: f64,
    pub lon: f64,
    pub l1_id: String,
    pub l2_id: String,
}

impl PairArgs {
    fn work_item(&self) -> WorkItem {
        WorkItem::new(
            DarkStore::new(self.store_id.clone(), self.lat, self.lon),
            Category::new(self.l1_id.clone(), self.l2_id.clone()),
        )
    }
}

/// Harvest a single pair; `dry_run` keeps records in memory and prints them
pub async fn harvest(config: Config, pair: PairArgs, dry_run: bool) -> Result<()> {
    let item = pair.work_item();
    let accountant = build_accountant(&config).await?;
    let fetcher = Arc::new(
        ListingFetcher::new(&config, accountant).context("Failed to create listing fetcher")?,
    );

    println!("Harvesting {item}");
    println!("  Endpoint: {}", fetcher.endpoint());
    println!("  Proxy: {}", if fetcher.has_proxy() { "configured" } else { "none" });
    println!("  Max pages: {}", config.scheduler.max_pages);
    println!();

    if dry_run {
        let memory = Arc::new(MemoryStore::default());
        let activities = HarvestActivities::new(
            memory.clone(),
            memory.clone(),
            fetcher,
            Arc::new(NoopLiveness),
            config.scheduler.max_pages,
        );

        let report = activities.harvest_pair(&item).await;
        for record in memory.records() {
            println!(
                "{}",
                serde_json::to_string(&record).context("Failed to serialize record")?
            );
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
        return Ok(());
    }

    let store = Arc::new(
        PostgresStore::connect(&config.database)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );
    let activities = HarvestActivities::new(
        store.clone(),
        store,
        fetcher,
        Arc::new(NoopLiveness),
        config.scheduler.max_pages,
    );

    activities.prepare().await.context("Failed to prepare sink")?;
    let report = activities.harvest_pair(&item).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    Ok(())
}
