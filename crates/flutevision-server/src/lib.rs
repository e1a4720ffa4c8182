//! FluteVision Server
//!
//! HTTP API over the [`flutevision_vision::VisionService`], plus the
//! configuration, rate limiting and dataset tooling used by the
//! `flutevision` binary.

pub mod config;
pub mod dataset;
pub mod limiter;
pub mod routes;
pub mod state;

pub use config::{Overrides, RateLimitConfig, ServerConfig};
pub use dataset::{extract_dataset, DatasetSummary, LabelCounts};
pub use limiter::{Decision, RateLimiter};
pub use routes::{create_router, AppError};
pub use state::AppState;
