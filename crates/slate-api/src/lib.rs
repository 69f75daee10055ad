//! Axum HTTP API server for the Slate scheduling backend.
//!
//! This crate provides:
//! - The AI schedule builder and its Gemini planner client
//! - Run-of-day, template and scene reconciliation endpoints
//! - Bearer token verification, rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use logging::{BuildLogger, BuildPhase};
pub use routes::create_router;
pub use services::{ScheduleBuilder, ScheduleStores};
pub use state::AppState;
