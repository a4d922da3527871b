//! Combinator batch scheduler
//!
//! The work set is every (dark store, category) pair. It is sliced into
//! fixed-size batches, and each batch runs as an independent execution that
//! returns a [`Continuation`] telling the caller whether another batch is due.
//!
//! # Architecture
//!
//! ```text
//!  orchestrator / `shelfwatch run`
//!        │  run_batch(batch_index)
//!        ▼
//! ┌──────────────────────────────────────────────┐
//! │               BatchScheduler                 │
//! │  list_stores ─┐                              │
//! │               ├─▶ CrossProduct ─▶ [start,end)│
//! │  list_categories                             │
//! │                       │ prepare              │
//! │                       ▼                      │
//! │        buffer_unordered(max_concurrency)     │
//! │        ┌──────────┬──────────┬──────────┐    │
//! │        │harvest   │harvest   │harvest   │    │
//! │        │  _pair   │  _pair   │  _pair   │    │
//! │        └──────────┴──────────┴──────────┘    │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!          BatchReport { next: Continue(i+1) | Done }
//! ```
//!
//! # Modules
//!
//! - [`batch`] - Cross-product ordering, [`BatchCursor`] and [`Continuation`]
//! - [`activities`] - Retry-safe units of work behind the orchestrator boundary
//! - [`runner`] - [`BatchScheduler`] and the local driver loop
//! - [`error`] - Batch-fatal errors

pub mod activities;
pub mod batch;
pub mod error;
pub mod runner;

pub use activities::HarvestActivities;
pub use batch::{batch_count, build_work_items, BatchCursor, Continuation, CrossProduct};
pub use error::{SchedulerError, SchedulerResult};
pub use runner::{BatchReport, BatchScheduler, RunSummary};
