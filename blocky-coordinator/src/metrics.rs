//! Metric samples and the aggregation queries run over them
//!
//! Provides:
//! - The allow-list of Blocky metric names kept by the parser
//! - `MetricValue`, which preserves int / float / raw token typing
//! - `MetricSet` scalar lookups (single value, sum, label-filtered)
//! - Label-grouped breakdowns with case-insensitive tagged counters

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Metric names retained from the `/metrics` endpoint. Everything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecognizedMetric {
    CacheEntries,
    CacheHitsTotal,
    CacheMissCount,
    DenylistCacheEntries,
    AllowlistCacheEntries,
    PrefetchDomainCacheEntries,
    ErrorTotal,
    QueryTotal,
    ResponseTotal,
    RequestDuration,
    BlockingEnabled,
    PrefetchesTotal,
    PrefetchHitsTotal,
    FailedDownloadsTotal,
    LastListGroupRefresh,
}

impl RecognizedMetric {
    pub const ALL: [RecognizedMetric; 15] = [
        RecognizedMetric::CacheEntries,
        RecognizedMetric::CacheHitsTotal,
        RecognizedMetric::CacheMissCount,
        RecognizedMetric::DenylistCacheEntries,
        RecognizedMetric::AllowlistCacheEntries,
        RecognizedMetric::PrefetchDomainCacheEntries,
        RecognizedMetric::ErrorTotal,
        RecognizedMetric::QueryTotal,
        RecognizedMetric::ResponseTotal,
        RecognizedMetric::RequestDuration,
        RecognizedMetric::BlockingEnabled,
        RecognizedMetric::PrefetchesTotal,
        RecognizedMetric::PrefetchHitsTotal,
        RecognizedMetric::FailedDownloadsTotal,
        RecognizedMetric::LastListGroupRefresh,
    ];

    /// Exposition name as published by Blocky.
    pub fn name(self) -> &'static str {
        match self {
            RecognizedMetric::CacheEntries => "blocky_cache_entries",
            RecognizedMetric::CacheHitsTotal => "blocky_cache_hits_total",
            RecognizedMetric::CacheMissCount => "blocky_cache_miss_count",
            RecognizedMetric::DenylistCacheEntries => "blocky_denylist_cache_entries",
            RecognizedMetric::AllowlistCacheEntries => "blocky_allowlist_cache_entries",
            RecognizedMetric::PrefetchDomainCacheEntries => "blocky_prefetch_domain_name_cache_entries",
            RecognizedMetric::ErrorTotal => "blocky_error_total",
            RecognizedMetric::QueryTotal => "blocky_query_total",
            RecognizedMetric::ResponseTotal => "blocky_response_total",
            RecognizedMetric::RequestDuration => "blocky_request_duration_ms",
            RecognizedMetric::BlockingEnabled => "blocky_blocking_enabled",
            RecognizedMetric::PrefetchesTotal => "blocky_prefetches_total",
            RecognizedMetric::PrefetchHitsTotal => "blocky_prefetch_hits_total",
            RecognizedMetric::FailedDownloadsTotal => "blocky_failed_downloads_total",
            RecognizedMetric::LastListGroupRefresh => "blocky_last_list_group_refresh_timestamp_seconds",
        }
    }

    /// Short key, used as the unique-id suffix of the matching sensor.
    pub fn key(self) -> &'static str {
        match self {
            RecognizedMetric::CacheEntries => "cache_entries",
            RecognizedMetric::CacheHitsTotal => "cache_hits_total",
            RecognizedMetric::CacheMissCount => "cache_miss_count",
            RecognizedMetric::DenylistCacheEntries => "denylist_cache_entries",
            RecognizedMetric::AllowlistCacheEntries => "allowlist_cache_entries",
            RecognizedMetric::PrefetchDomainCacheEntries => "prefetch_domain_cache_entries",
            RecognizedMetric::ErrorTotal => "error_total",
            RecognizedMetric::QueryTotal => "query_total",
            RecognizedMetric::ResponseTotal => "response_total",
            RecognizedMetric::RequestDuration => "request_duration",
            RecognizedMetric::BlockingEnabled => "blocking_enabled",
            RecognizedMetric::PrefetchesTotal => "prefetches_total",
            RecognizedMetric::PrefetchHitsTotal => "prefetch_hits_total",
            RecognizedMetric::FailedDownloadsTotal => "failed_downloads_total",
            RecognizedMetric::LastListGroupRefresh => "last_list_group_refresh",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|metric| metric.name() == name)
    }

    pub fn is_recognized(name: &str) -> bool {
        Self::from_name(name).is_some()
    }
}

/// A sample value. Integers stay integers; unparsable tokens are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Raw(String),
}

impl MetricValue {
    /// Parse a value token: float when it contains `.`, integer otherwise,
    /// the raw token when neither parse succeeds.
    pub fn parse(token: &str) -> Self {
        if token.contains('.') {
            match token.parse::<f64>() {
                Ok(value) => MetricValue::Float(value),
                Err(_) => MetricValue::Raw(token.to_string()),
            }
        } else {
            match token.parse::<i64>() {
                Ok(value) => MetricValue::Int(value),
                Err(_) => MetricValue::Raw(token.to_string()),
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, MetricValue::Raw(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(value) => Some(*value as f64),
            MetricValue::Float(value) => Some(*value),
            MetricValue::Raw(_) => None,
        }
    }

    /// Numeric addition. A raw token contributes nothing; integer overflow widens to float.
    pub fn plus(&self, other: &MetricValue) -> MetricValue {
        match (self, other) {
            (MetricValue::Raw(_), MetricValue::Raw(_)) => MetricValue::Int(0),
            (lhs, MetricValue::Raw(_)) => lhs.clone(),
            (MetricValue::Raw(_), rhs) => rhs.clone(),
            (MetricValue::Int(a), MetricValue::Int(b)) => match a.checked_add(*b) {
                Some(sum) => MetricValue::Int(sum),
                None => MetricValue::Float(*a as f64 + *b as f64),
            },
            (lhs, rhs) => {
                MetricValue::Float(lhs.as_f64().unwrap_or(0.0) + rhs.as_f64().unwrap_or(0.0))
            }
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(value) => write!(f, "{}", value),
            MetricValue::Float(value) => write!(f, "{}", value),
            MetricValue::Raw(token) => f.write_str(token),
        }
    }
}

/// One parsed observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub value: MetricValue,
    pub labels: BTreeMap<String, String>,
}

impl Sample {
    pub fn new(value: MetricValue) -> Self {
        Self {
            value,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    fn matches(&self, filter: &[(&str, &str)]) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.labels.get(*key).map(String::as_str) == Some(*expected))
    }
}

/// Samples grouped by metric name, in encounter order within each name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricSet {
    samples: BTreeMap<String, Vec<Sample>>,
}

/// Per-bucket sums plus the named counters requested alongside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub buckets: BTreeMap<String, MetricValue>,
    pub tagged: BTreeMap<String, MetricValue>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, sample: Sample) {
        self.samples.entry(name.to_string()).or_default().push(sample);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of distinct metric names.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn samples(&self, name: &str) -> &[Sample] {
        self.samples.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Scalar view of a metric: the single value as-is, or the sum of the
    /// numeric values when several samples exist. `None` means unavailable.
    pub fn value(&self, name: &str) -> Option<MetricValue> {
        match self.samples(name) {
            [] => None,
            [only] => Some(only.value.clone()),
            many => Some(
                many.iter()
                    .filter(|sample| sample.value.is_numeric())
                    .fold(MetricValue::Int(0), |acc, sample| acc.plus(&sample.value)),
            ),
        }
    }

    /// Value of the first sample whose labels carry every `(key, value)` of the filter.
    /// An empty filter behaves like [`MetricSet::value`].
    pub fn value_where(&self, name: &str, filter: &[(&str, &str)]) -> Option<MetricValue> {
        if filter.is_empty() {
            return self.value(name);
        }
        self.samples(name)
            .iter()
            .find(|sample| sample.matches(filter))
            .map(|sample| sample.value.clone())
    }

    /// Sum samples into buckets keyed by `label` (`fallback` when the label is absent).
    ///
    /// Each entry of `tags` also gets a counter fed by samples whose label value
    /// equals the tag ignoring case. Tag counters start at zero.
    pub fn breakdown(&self, name: &str, label: &str, fallback: &str, tags: &[&str]) -> Breakdown {
        let mut breakdown = Breakdown::default();
        for tag in tags {
            breakdown
                .tagged
                .insert(tag.to_string(), MetricValue::Int(0));
        }

        for sample in self.samples(name) {
            let bucket = sample
                .labels
                .get(label)
                .map(String::as_str)
                .unwrap_or(fallback);

            let slot = breakdown
                .buckets
                .entry(bucket.to_string())
                .or_insert(MetricValue::Int(0));
            *slot = slot.plus(&sample.value);

            if let Some(tag) = tags.iter().find(|tag| tag.eq_ignore_ascii_case(bucket)) {
                if let Some(counter) = breakdown.tagged.get_mut(*tag) {
                    *counter = counter.plus(&sample.value);
                }
            }
        }

        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_totals() -> MetricSet {
        let mut set = MetricSet::new();
        set.push(
            "blocky_query_total",
            Sample::new(MetricValue::Int(3)).with_label("client", "x").with_label("type", "A"),
        );
        set.push(
            "blocky_query_total",
            Sample::new(MetricValue::Int(5)).with_label("client", "y").with_label("type", "A"),
        );
        set
    }

    #[test]
    fn test_value_parsing_keeps_type() {
        assert_eq!(MetricValue::parse("42"), MetricValue::Int(42));
        assert_eq!(MetricValue::parse("0.25"), MetricValue::Float(0.25));
        assert_eq!(MetricValue::parse("1e+06"), MetricValue::Raw("1e+06".into()));
        assert_eq!(MetricValue::parse("NaN"), MetricValue::Raw("NaN".into()));
    }

    #[test]
    fn test_unknown_metric_is_unavailable() {
        let set = MetricSet::new();
        assert_eq!(set.value("blocky_cache_entries"), None);
        assert_eq!(set.value_where("blocky_cache_entries", &[("type", "A")]), None);
    }

    #[test]
    fn test_single_sample_returned_as_is() {
        let mut set = MetricSet::new();
        set.push("blocky_cache_entries", Sample::new(MetricValue::Float(1.5)));
        assert_eq!(set.value("blocky_cache_entries"), Some(MetricValue::Float(1.5)));

        let mut raw = MetricSet::new();
        raw.push("blocky_cache_entries", Sample::new(MetricValue::Raw("+Inf".into())));
        assert_eq!(raw.value("blocky_cache_entries"), Some(MetricValue::Raw("+Inf".into())));
    }

    #[test]
    fn test_multiple_samples_are_summed() {
        assert_eq!(query_totals().value("blocky_query_total"), Some(MetricValue::Int(8)));
    }

    #[test]
    fn test_sum_skips_raw_and_widens_to_float() {
        let mut set = query_totals();
        set.push("blocky_query_total", Sample::new(MetricValue::Raw("oops".into())));
        assert_eq!(set.value("blocky_query_total"), Some(MetricValue::Int(8)));

        set.push("blocky_query_total", Sample::new(MetricValue::Float(0.5)));
        assert_eq!(set.value("blocky_query_total"), Some(MetricValue::Float(8.5)));
    }

    #[test]
    fn test_filter_returns_first_match() {
        let set = query_totals();
        assert_eq!(
            set.value_where("blocky_query_total", &[("type", "A")]),
            Some(MetricValue::Int(3))
        );
        assert_eq!(
            set.value_where("blocky_query_total", &[("client", "y"), ("type", "A")]),
            Some(MetricValue::Int(5))
        );
        assert_eq!(set.value_where("blocky_query_total", &[("type", "AAAA")]), None);
        assert_eq!(set.value_where("blocky_query_total", &[]), Some(MetricValue::Int(8)));
    }

    #[test]
    fn test_breakdown_with_tags() {
        let mut set = MetricSet::new();
        let name = "blocky_response_total";
        set.push(name, Sample::new(MetricValue::Int(4)).with_label("response_type", "BLOCKED"));
        set.push(name, Sample::new(MetricValue::Int(6)).with_label("response_type", "cached"));
        set.push(name, Sample::new(MetricValue::Int(1)).with_label("response_type", "blocked"));
        set.push(name, Sample::new(MetricValue::Raw("x".into())));

        let breakdown = set.breakdown(name, "response_type", "unknown", &["blocked", "cached"]);
        assert_eq!(breakdown.buckets["BLOCKED"], MetricValue::Int(4));
        assert_eq!(breakdown.buckets["blocked"], MetricValue::Int(1));
        assert_eq!(breakdown.buckets["unknown"], MetricValue::Int(0));
        assert_eq!(breakdown.tagged["blocked"], MetricValue::Int(5));
        assert_eq!(breakdown.tagged["cached"], MetricValue::Int(6));
    }

    #[test]
    fn test_allow_list_lookup() {
        assert_eq!(
            RecognizedMetric::from_name("blocky_query_total"),
            Some(RecognizedMetric::QueryTotal)
        );
        assert!(!RecognizedMetric::is_recognized("go_goroutines"));
        for metric in RecognizedMetric::ALL {
            assert_eq!(RecognizedMetric::from_name(metric.name()), Some(metric));
        }
    }
}
