//! Heartbeat registry for in-flight pair harvests
//!
//! A pair harvest may legitimately run for a long time (up to the page cap,
//! with admission waits in between). Beats let a supervisor tell a slow but
//! progressing harvest apart from a stalled one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::WorkItem;

/// Where a harvest is within its current page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestPhase {
    /// Waiting on admission or the upstream response
    Fetching,
    /// Page records handed to the sink
    Processed,
}

/// Receiver of harvest heartbeats
#[async_trait]
pub trait Liveness: Send + Sync {
    /// Record progress on `page` of `item`
    async fn beat(&self, item: &WorkItem, page: u32, phase: HarvestPhase);

    /// The harvest of `item` has ended
    async fn finish(&self, item: &WorkItem);
}

/// Liveness sink that discards every beat
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLiveness;

#[async_trait]
impl Liveness for NoopLiveness {
    async fn beat(&self, _item: &WorkItem, _page: u32, _phase: HarvestPhase) {}

    async fn finish(&self, _item: &WorkItem) {}
}

/// Health of one in-flight harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvesterStatus {
    /// Beat within the timeout
    Active,
    /// No beat for longer than the timeout
    Stalled,
}

/// Progress of one in-flight harvest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvesterInfo {
    pub item: String,
    pub store_id: String,
    pub l1_id: String,
    pub l2_id: String,
    pub page: u32,
    pub phase: HarvestPhase,
    pub beats: u64,
    pub started_at: DateTime<Utc>,
    pub last_beat: DateTime<Utc>,
}

impl HarvesterInfo {
    /// Check if the last beat is older than `timeout_secs`
    pub fn is_heartbeat_stale(&self, timeout_secs: i64) -> bool {
        self.seconds_since_beat() > timeout_secs
    }

    pub fn seconds_since_beat(&self) -> i64 {
        (Utc::now() - self.last_beat).num_seconds()
    }
}

/// Point-in-time view of a harvest for the admin API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvesterSnapshot {
    #[serde(flatten)]
    pub info: HarvesterInfo,
    pub status: HarvesterStatus,
    pub seconds_since_beat: i64,
}

/// In-process registry of in-flight harvests keyed by item label
pub struct LivenessTracker {
    entries: RwLock<HashMap<String, HarvesterInfo>>,
    timeout_secs: i64,
}

impl LivenessTracker {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            timeout_secs: i64::try_from(timeout_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn timeout_secs(&self) -> i64 {
        self.timeout_secs
    }

    /// Number of harvests currently registered
    pub async fn active_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Every in-flight harvest, ordered by item label
    pub async fn snapshot(&self) -> Vec<HarvesterSnapshot> {
        let entries = self.entries.read().await;
        let mut snapshots: Vec<_> = entries
            .values()
            .map(|info| HarvesterSnapshot {
                status: if info.is_heartbeat_stale(self.timeout_secs) {
                    HarvesterStatus::Stalled
                } else {
                    HarvesterStatus::Active
                },
                seconds_since_beat: info.seconds_since_beat(),
                info: info.clone(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.info.item.cmp(&b.info.item));
        snapshots
    }

    /// Harvests whose last beat is older than the timeout
    pub async fn stalled(&self) -> Vec<HarvesterSnapshot> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|s| s.status == HarvesterStatus::Stalled)
            .collect()
    }
}

#[async_trait]
impl Liveness for LivenessTracker {
    async fn beat(&self, item: &WorkItem, page: u32, phase: HarvestPhase) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let info = entries.entry(item.label()).or_insert_with(|| HarvesterInfo {
            item: item.label(),
            store_id: item.store.store_id.clone(),
            l1_id: item.category.l1_id.clone(),
            l2_id: item.category.l2_id.clone(),
            page,
            phase,
            beats: 0,
            started_at: now,
            last_beat: now,
        });
        info.page = page;
        info.phase = phase;
        info.beats += 1;
        info.last_beat = now;
    }

    async fn finish(&self, item: &WorkItem) {
        self.entries.write().await.remove(&item.label());
    }
}
