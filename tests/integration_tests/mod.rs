//! Integration tests module
//!
//! End-to-end tests for the shelfwatch harvester, including:
//! - Page loop stop conditions and sink failure handling
//! - Cross-product batching, continuation and checkpoint resume
//! - Admin API routes over the in-memory accountant

pub mod admin_test;
pub mod batch_test;
pub mod fixtures;
pub mod harvest_test;
