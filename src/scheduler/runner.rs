//! Batch execution and the local driver
//!
//! [`BatchScheduler::run_batch`] is the re-entry point: it derives everything
//! it needs from `batch_index` alone, so an orchestrator can run each batch
//! as a fresh execution and carry only the returned [`Continuation`].

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::activities::HarvestActivities;
use super::batch::{BatchCursor, Continuation, CrossProduct};
use super::error::{SchedulerError, SchedulerResult};
use crate::config::SchedulerConfig;
use crate::crawler::HarvestReport;
use crate::metrics;
use crate::storage::CursorCheckpoint;

/// Result of one batch execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_index: u64,
    pub batch_size: u64,
    /// Size of the whole cross product
    pub total_items: u64,
    pub start: u64,
    pub end: u64,
    pub pairs: Vec<HarvestReport>,
    /// Labels of pairs that stopped on a fetch failure, sorted
    pub failed_pairs: Vec<String>,
    pub records_written: u64,
    pub next: Continuation,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn is_done(&self) -> bool {
        self.next.is_done()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

/// Totals of a local driver run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub first_batch: u64,
    pub batches: u64,
    pub pairs: u64,
    pub failed_pairs: u64,
    pub records_written: u64,
}

pub struct BatchScheduler {
    activities: Arc<HarvestActivities>,
    batch_size: u64,
    max_concurrency: usize,
}

impl BatchScheduler {
    pub fn new(
        activities: Arc<HarvestActivities>,
        batch_size: u64,
        max_concurrency: usize,
    ) -> SchedulerResult<Self> {
        if batch_size == 0 {
            return Err(SchedulerError::invalid_config(
                "batch_size",
                "must be greater than 0",
            ));
        }
        if max_concurrency == 0 {
            return Err(SchedulerError::invalid_config(
                "max_concurrency",
                "must be greater than 0",
            ));
        }

        Ok(Self {
            activities,
            batch_size,
            max_concurrency,
        })
    }

    pub fn from_config(
        activities: Arc<HarvestActivities>,
        config: &SchedulerConfig,
    ) -> SchedulerResult<Self> {
        Self::new(activities, config.batch_size, config.max_concurrency)
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn activities(&self) -> &Arc<HarvestActivities> {
        &self.activities
    }

    /// Run the batch at `batch_index`
    ///
    /// A batch past the end of the work set returns `Done` without preparing
    /// the sink or fetching anything. Pair failures are reported, never raised.
    pub async fn run_batch(&self, batch_index: u64) -> SchedulerResult<BatchReport> {
        let timer = Instant::now();
        let started_at = Utc::now();
        let cursor = BatchCursor::new(batch_index, self.batch_size);

        let (stores, categories) = tokio::try_join!(
            async {
                self.activities
                    .list_stores()
                    .await
                    .map_err(|e| SchedulerError::catalog("list_stores", e))
            },
            async {
                self.activities
                    .list_categories()
                    .await
                    .map_err(|e| SchedulerError::catalog("list_categories", e))
            },
        )?;

        let plan = CrossProduct::new(stores, categories);
        let total = plan.len();

        let Some(range) = cursor.range(total) else {
            info!(
                batch_index,
                start = cursor.start(),
                total,
                "Batch starts past the end of the work set"
            );
            let next = Continuation::Done;
            metrics::record_batch(next.as_str(), timer.elapsed().as_secs_f64());
            return Ok(BatchReport {
                batch_index,
                batch_size: self.batch_size,
                total_items: total,
                start: total,
                end: total,
                pairs: Vec::new(),
                failed_pairs: Vec::new(),
                records_written: 0,
                next,
                started_at,
                finished_at: Utc::now(),
            });
        };

        self.activities
            .prepare()
            .await
            .map_err(|e| SchedulerError::prepare(&e))?;

        info!(
            batch_index,
            start = range.start,
            end = range.end,
            total,
            stores = plan.store_count(),
            categories = plan.category_count(),
            concurrency = self.max_concurrency,
            "Starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let pairs: Vec<HarvestReport> = stream::iter(plan.items(range.clone()))
            .map(|item| {
                let sem = Arc::clone(&semaphore);
                let activities = Arc::clone(&self.activities);
                async move {
                    let _permit = sem.acquire_owned().await.ok();
                    activities.harvest_pair(&item).await
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut failed_pairs: Vec<String> = pairs
            .iter()
            .filter(|report| report.is_failure())
            .map(|report| report.item.label())
            .collect();
        failed_pairs.sort();

        let records_written = pairs.iter().map(|report| report.records_written).sum();

        let next = if range.end < total {
            Continuation::Continue {
                next_batch_index: batch_index + 1,
            }
        } else {
            Continuation::Done
        };

        let elapsed = timer.elapsed();
        metrics::record_batch(next.as_str(), elapsed.as_secs_f64());

        if failed_pairs.is_empty() {
            info!(
                batch_index,
                pairs = pairs.len(),
                records = records_written,
                next = next.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Batch finished"
            );
        } else {
            warn!(
                batch_index,
                pairs = pairs.len(),
                failed = failed_pairs.len(),
                records = records_written,
                next = next.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Batch finished with failed pairs"
            );
        }

        Ok(BatchReport {
            batch_index,
            batch_size: self.batch_size,
            total_items: total,
            start: range.start,
            end: range.end,
            pairs,
            failed_pairs,
            records_written,
            next,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Where a driver run should begin
    ///
    /// An explicit `from` wins. Otherwise an unfinished checkpoint resumes at
    /// its batch, and a finished or missing one starts a new sweep at 0.
    pub fn resume_index(
        from: Option<u64>,
        checkpoint: Option<&CursorCheckpoint>,
    ) -> SchedulerResult<u64> {
        if let Some(index) = from {
            return Ok(index);
        }
        let Some(checkpoint) = checkpoint else {
            return Ok(0);
        };

        match checkpoint
            .load()
            .map_err(|e| SchedulerError::checkpoint("load", e))?
        {
            Some(record) if !record.finished => {
                info!(
                    batch_index = record.cursor.batch_index,
                    path = %checkpoint.path().display(),
                    "Resuming from checkpoint"
                );
                Ok(record.cursor.batch_index)
            }
            _ => Ok(0),
        }
    }

    /// Run batches from `from` until one returns `Done`
    ///
    /// Each batch is a fresh `run_batch` call. The checkpoint, when given, is
    /// written after every batch so an interrupted run picks up at the batch
    /// that was in flight.
    pub async fn run_until_done(
        &self,
        from: Option<u64>,
        checkpoint: Option<&CursorCheckpoint>,
    ) -> SchedulerResult<RunSummary> {
        let first_batch = Self::resume_index(from, checkpoint)?;
        let mut summary = RunSummary {
            first_batch,
            ..RunSummary::default()
        };
        let mut batch_index = first_batch;

        loop {
            if let Some(checkpoint) = checkpoint {
                checkpoint
                    .save(BatchCursor::new(batch_index, self.batch_size), false)
                    .map_err(|e| SchedulerError::checkpoint("save", e))?;
            }

            let report = self.run_batch(batch_index).await?;
            summary.batches += 1;
            summary.pairs += report.pairs.len() as u64;
            summary.failed_pairs += report.failed_pairs.len() as u64;
            summary.records_written += report.records_written;

            match report.next {
                Continuation::Continue { next_batch_index } => {
                    batch_index = next_batch_index;
                }
                Continuation::Done => {
                    if let Some(checkpoint) = checkpoint {
                        checkpoint
                            .save(BatchCursor::new(batch_index, self.batch_size), true)
                            .map_err(|e| SchedulerError::checkpoint("save", e))?;
                    }
                    break;
                }
            }
        }

        info!(
            first_batch = summary.first_batch,
            batches = summary.batches,
            pairs = summary.pairs,
            failed = summary.failed_pairs,
            records = summary.records_written,
            "Run complete"
        );

        Ok(summary)
    }
}
