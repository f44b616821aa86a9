//! Point-in-time view of the remote blocking status and metrics
//!
//! A `Snapshot` is built once per successful refresh and replaced wholesale;
//! readers hold an `Arc` to the version they observed.

use crate::metrics::MetricSet;
use crate::status::BlockingStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Absent when the status payload carried no boolean `enabled`.
    pub enabled: Option<bool>,
    pub auto_enable_in_sec: Option<i64>,
    pub disabled_groups: Vec<String>,
    /// Empty when metrics are disabled or the last metrics fetch failed.
    pub metrics: MetricSet,
    /// Normalized status object, including fields not modelled above.
    #[serde(skip)]
    pub raw_status: Map<String, Value>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(status: BlockingStatus, raw_status: Map<String, Value>, metrics: MetricSet) -> Self {
        Self {
            enabled: status.enabled,
            auto_enable_in_sec: status.auto_enable_in_sec,
            disabled_groups: status.disabled_groups,
            metrics,
            raw_status,
            fetched_at: Utc::now(),
        }
    }
}
