//! Blocky coordinator - polling and metrics normalization for the Blocky DNS blocker
//!
//! Polls Blocky's HTTP status API and, optionally, its Prometheus endpoint,
//! keeps the latest normalized `Snapshot`, and exposes the control actions
//! (enable / disable blocking, refresh lists, flush cache, DNS query).

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod prometheus;
pub mod snapshot;
pub mod status;
pub mod validate;
pub mod views;

pub use config::{CoordinatorConfig, MetricsEndpoint};
pub use coordinator::{Coordinator, RefreshState, SETTLING_DELAY};
pub use error::{ConfigError, RefreshError, SetupError};
pub use metrics::{Breakdown, MetricSet, MetricValue, RecognizedMetric, Sample};
pub use snapshot::Snapshot;
pub use validate::{validate_connection, ValidatedEntry};
