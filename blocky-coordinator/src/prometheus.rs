//! Prometheus text exposition parser
//!
//! Handles `name [{labels}] value [timestamp]` lines. Comments, blank lines and
//! anything that does not match that shape are skipped without error. Only
//! names on the [`RecognizedMetric`] allow-list are retained.

use crate::metrics::{MetricSet, MetricValue, RecognizedMetric, Sample};
use std::collections::BTreeMap;

/// Parse exposition text into a [`MetricSet`] of recognized metrics.
pub fn parse_metrics(text: &str) -> MetricSet {
    let mut set = MetricSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, sample)) = parse_line(line) else {
            continue;
        };
        if RecognizedMetric::is_recognized(name) {
            set.push(name, sample);
        }
    }
    set
}

/// Split one sample line into its metric name and sample.
pub fn parse_line(line: &str) -> Option<(&str, Sample)> {
    let name_len = metric_name_len(line);
    if name_len == 0 {
        return None;
    }
    let (name, mut rest) = line.split_at(name_len);

    let mut labels = BTreeMap::new();
    if let Some(block) = rest.strip_prefix('{') {
        let close = block.find('}')?;
        labels = parse_labels(&block[..close]);
        rest = &block[close + 1..];
    }

    // The value must be separated from the name or label block by whitespace.
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let token = rest.split_whitespace().next()?;

    Some((
        name,
        Sample {
            value: MetricValue::parse(token),
            labels,
        },
    ))
}

/// Length in bytes of the leading `[a-zA-Z_:][a-zA-Z0-9_:]*` run.
fn metric_name_len(line: &str) -> usize {
    let mut len = 0;
    for (index, c) in line.char_indices() {
        let valid = if index == 0 {
            c.is_ascii_alphabetic() || c == '_' || c == ':'
        } else {
            c.is_ascii_alphanumeric() || c == '_' || c == ':'
        };
        if !valid {
            break;
        }
        len = index + c.len_utf8();
    }
    len
}

/// Comma-separated `key="value"` pairs. Values are literal: no escape handling.
fn parse_labels(block: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for pair in block.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        labels.insert(key.to_string(), value.to_string());
    }
    labels
}
