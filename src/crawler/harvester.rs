//! Paginated harvest of one (store, category) pair

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::fetcher::{ListingFetcher, ListingQuery};
use super::liveness::{HarvestPhase, Liveness};
use super::outcome::{FetchOutcome, OutcomeKind};
use crate::metrics;
use crate::models::WorkItem;
use crate::storage::RecordSink;
use crate::transform::{listing_objects, ListingTransformer};

/// Why a pair harvest stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// `page` came back without listings
    Exhausted { page: u32 },
    /// Every page up to the cap had listings
    PageCap,
    /// `page` could not be fetched
    FetchFailed { page: u32, kind: OutcomeKind },
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "exhausted",
            Self::PageCap => "page_cap",
            Self::FetchFailed { .. } => "fetch_failed",
        }
    }
}

/// Summary of one pair harvest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
    pub item: WorkItem,
    /// Pages requested, including the one that stopped the harvest
    pub pages_fetched: u32,
    pub records_written: u64,
    pub sink_failures: u32,
    /// Pages served through the proxy
    pub proxy_pages: u32,
    pub stop: StopReason,
}

impl HarvestReport {
    pub fn is_failure(&self) -> bool {
        self.stop.is_failure()
    }
}

/// Drives the fetch client page by page for one pair
pub struct PageHarvester {
    fetcher: Arc<ListingFetcher>,
    transformer: Arc<dyn ListingTransformer>,
    sink: Arc<dyn RecordSink>,
    liveness: Arc<dyn Liveness>,
}

impl PageHarvester {
    pub fn new(
        fetcher: Arc<ListingFetcher>,
        transformer: Arc<dyn ListingTransformer>,
        sink: Arc<dyn RecordSink>,
        liveness: Arc<dyn Liveness>,
    ) -> Self {
        Self {
            fetcher,
            transformer,
            sink,
            liveness,
        }
    }

    /// Harvest pages `1..=max_pages` of `item`
    ///
    /// Stops at the first page without listings, at the first page that
    /// cannot be fetched, or after `max_pages`. A page whose records the sink
    /// rejects is counted and skipped; the harvest continues.
    pub async fn harvest(&self, item: &WorkItem, max_pages: u32) -> HarvestReport {
        metrics::update_active_harvesters(1);
        let report = self.harvest_pages(item, max_pages).await;
        self.liveness.finish(item).await;
        metrics::update_active_harvesters(-1);
        metrics::record_pair_outcome(report.stop.as_str());

        if report.is_failure() {
            warn!(
                item = %item,
                pages = report.pages_fetched,
                records = report.records_written,
                stop = ?report.stop,
                "Pair harvest failed"
            );
        } else {
            info!(
                item = %item,
                pages = report.pages_fetched,
                records = report.records_written,
                sink_failures = report.sink_failures,
                stop = report.stop.as_str(),
                "Pair harvest finished"
            );
        }

        report
    }

    async fn harvest_pages(&self, item: &WorkItem, max_pages: u32) -> HarvestReport {
        let mut report = HarvestReport {
            item: item.clone(),
            pages_fetched: 0,
            records_written: 0,
            sink_failures: 0,
            proxy_pages: 0,
            stop: StopReason::PageCap,
        };

        for page in 1..=max_pages {
            self.liveness.beat(item, page, HarvestPhase::Fetching).await;

            let query = ListingQuery::for_item(item, page);
            let outcome = self.fetcher.fetch(&query).await;
            report.pages_fetched += 1;

            let (payload, via_proxy) = match outcome {
                FetchOutcome::Success { payload, via_proxy } => (payload, via_proxy),
                other => {
                    debug!(item = %item, page, outcome = ?other, "Page fetch failed");
                    report.stop = StopReason::FetchFailed {
                        page,
                        kind: other.kind(),
                    };
                    return report;
                }
            };

            if via_proxy {
                report.proxy_pages += 1;
            }

            if listing_objects(&payload).is_none() {
                debug!(item = %item, page, "No listings on page, pair exhausted");
                report.stop = StopReason::Exhausted { page };
                return report;
            }

            let records = self.transformer.transform(&payload, item, Utc::now());
            match self.sink.append(&records).await {
                Ok(written) => {
                    report.records_written += written;
                    metrics::record_page(written);
                }
                Err(e) => {
                    report.sink_failures += 1;
                    metrics::record_sink_failure();
                    warn!(
                        item = %item,
                        page,
                        records = records.len(),
                        error = %e,
                        "Failed to append page records"
                    );
                }
            }

            self.liveness.beat(item, page, HarvestPhase::Processed).await;
        }

        report.stop = StopReason::PageCap;
        report
    }
}
