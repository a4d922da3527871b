//! Listing fetch and pagination
//!
//! - [`fetcher`] - HTTP client with rate admission and the proxy ladder
//! - [`headers`] - Identifying request headers and User-Agent rotation
//! - [`outcome`] - Classification of a single fetch
//! - [`harvester`] - Page loop for one (store, category) pair
//! - [`liveness`] - Heartbeats of in-flight harvests

pub mod fetcher;
pub mod harvester;
pub mod headers;
pub mod liveness;
pub mod outcome;

pub use fetcher::{ListingFetcher, ListingQuery};
pub use harvester::{HarvestReport, PageHarvester, StopReason};
pub use liveness::{HarvestPhase, Liveness, LivenessTracker, NoopLiveness};
pub use outcome::{FetchOutcome, OutcomeKind};
