//! Derived aggregates over a `MetricSet`, as shown next to the metric sensors

use crate::metrics::{MetricSet, MetricValue, RecognizedMetric};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const UNKNOWN: &str = "unknown";

/// Query counts split by client and by DNS record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryBreakdown {
    pub by_client: BTreeMap<String, MetricValue>,
    pub by_type: BTreeMap<String, MetricValue>,
}

impl QueryBreakdown {
    pub fn from_metrics(metrics: &MetricSet) -> Self {
        let name = RecognizedMetric::QueryTotal.name();
        Self {
            by_client: metrics.breakdown(name, "client", UNKNOWN, &[]).buckets,
            by_type: metrics.breakdown(name, "type", UNKNOWN, &[]).buckets,
        }
    }
}

/// Response counts split by response type and reason, plus blocked / cached totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseBreakdown {
    pub by_response_type: BTreeMap<String, MetricValue>,
    pub by_reason: BTreeMap<String, MetricValue>,
    pub blocked: MetricValue,
    pub cached: MetricValue,
}

impl ResponseBreakdown {
    pub fn from_metrics(metrics: &MetricSet) -> Self {
        let name = RecognizedMetric::ResponseTotal.name();
        let mut by_type = metrics.breakdown(name, "response_type", UNKNOWN, &["blocked", "cached"]);
        let by_reason = metrics.breakdown(name, "reason", UNKNOWN, &[]);

        Self {
            by_response_type: by_type.buckets,
            by_reason: by_reason.buckets,
            blocked: by_type.tagged.remove("blocked").unwrap_or(MetricValue::Int(0)),
            cached: by_type.tagged.remove("cached").unwrap_or(MetricValue::Int(0)),
        }
    }
}

/// Deny / allow list cache sizes per list group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListCacheBreakdown {
    pub by_group: BTreeMap<String, MetricValue>,
}

impl ListCacheBreakdown {
    pub fn from_metrics(metrics: &MetricSet, metric: RecognizedMetric) -> Self {
        Self {
            by_group: metrics.breakdown(metric.name(), "group", "default", &[]).buckets,
        }
    }
}

/// Time of the last list group refresh, when the gauge holds a positive number.
pub fn last_list_refresh(metrics: &MetricSet) -> Option<DateTime<Utc>> {
    let seconds = metrics
        .value(RecognizedMetric::LastListGroupRefresh.name())?
        .as_f64()?;
    if seconds <= 0.0 {
        return None;
    }
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prometheus::parse_metrics;

    const EXPOSITION: &str = r#"
blocky_query_total{client="laptop",type="A"} 3
blocky_query_total{client="phone",type="A"} 5
blocky_query_total{client="phone",type="AAAA"} 2
blocky_response_total{reason="BLOCKED (ads)",response_type="BLOCKED"} 4
blocky_response_total{reason="CACHED",response_type="CACHED"} 10
blocky_response_total{reason="RESOLVED",response_type="RESOLVED"} 6
blocky_response_total 1
blocky_denylist_cache_entries{group="ads"} 1200
blocky_denylist_cache_entries{group="malware"} 300
blocky_denylist_cache_entries 5
blocky_last_list_group_refresh_timestamp_seconds 1700000000
"#;

    #[test]
    fn test_query_breakdown() {
        let view = QueryBreakdown::from_metrics(&parse_metrics(EXPOSITION));
        assert_eq!(view.by_client["laptop"], MetricValue::Int(3));
        assert_eq!(view.by_client["phone"], MetricValue::Int(7));
        assert_eq!(view.by_type["A"], MetricValue::Int(8));
        assert_eq!(view.by_type["AAAA"], MetricValue::Int(2));
    }

    #[test]
    fn test_response_breakdown() {
        let view = ResponseBreakdown::from_metrics(&parse_metrics(EXPOSITION));
        assert_eq!(view.blocked, MetricValue::Int(4));
        assert_eq!(view.cached, MetricValue::Int(10));
        assert_eq!(view.by_response_type["unknown"], MetricValue::Int(1));
        assert_eq!(view.by_reason["BLOCKED (ads)"], MetricValue::Int(4));
        assert_eq!(view.by_reason.len(), 4);
    }

    #[test]
    fn test_response_breakdown_without_samples() {
        let view = ResponseBreakdown::from_metrics(&MetricSet::new());
        assert_eq!(view.blocked, MetricValue::Int(0));
        assert!(view.by_reason.is_empty());
    }

    #[test]
    fn test_list_cache_breakdown() {
        let view = ListCacheBreakdown::from_metrics(
            &parse_metrics(EXPOSITION),
            RecognizedMetric::DenylistCacheEntries,
        );
        assert_eq!(view.by_group["ads"], MetricValue::Int(1200));
        assert_eq!(view.by_group["default"], MetricValue::Int(5));
    }

    #[test]
    fn test_last_list_refresh() {
        let when = last_list_refresh(&parse_metrics(EXPOSITION)).unwrap();
        assert_eq!(when.timestamp(), 1_700_000_000);

        let zero = parse_metrics("blocky_last_list_group_refresh_timestamp_seconds 0");
        assert!(last_list_refresh(&zero).is_none());
        assert!(last_list_refresh(&MetricSet::new()).is_none());
    }
}
