//! Administrative HTTP surface
//!
//! Read-only views of the shared rate budget and in-flight harvests, a reset
//! for a named budget key, and the Prometheus exposition.
//!
//! - [`api`] - Routes and handlers
//! - [`server`] - Shared state, router layers and the listener loop

pub mod api;
pub mod server;

pub use api::{create_router, ApiResponse, ErrorResponse};
pub use server::{AdminServer, AppState, ServerError};
