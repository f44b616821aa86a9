/*!
Builders for Blocky payloads

- `StatusPayload` for `/api/blocking/status` bodies
- `ExpositionBuilder` for `/metrics` text in Prometheus exposition format
*/

use serde_json::{Map, Value};

/// Status body as Blocky returns it (camelCase keys).
#[derive(Debug, Clone)]
pub struct StatusPayload {
    fields: Map<String, Value>,
}

impl StatusPayload {
    pub fn enabled() -> Self {
        let mut fields = Map::new();
        fields.insert("enabled".into(), Value::Bool(true));
        fields.insert("disabledGroups".into(), Value::Array(Vec::new()));
        Self { fields }
    }

    /// Blocking paused, re-enabling after `auto_enable_in_sec` seconds.
    pub fn disabled(auto_enable_in_sec: i64, groups: &[&str]) -> Self {
        let mut fields = Map::new();
        fields.insert("enabled".into(), Value::Bool(false));
        fields.insert("autoEnableInSec".into(), Value::from(auto_enable_in_sec));
        fields.insert(
            "disabledGroups".into(),
            Value::Array(groups.iter().map(|g| Value::from(*g)).collect()),
        );
        Self { fields }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn without_field(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Accumulates exposition lines.
#[derive(Debug, Clone, Default)]
pub struct ExpositionBuilder {
    lines: Vec<String>,
}

impl ExpositionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scrape resembling a small home Blocky, including metrics outside the allow-list.
    pub fn typical() -> Self {
        Self::new()
            .help("blocky_cache_entries", "Number of entries in cache", "gauge")
            .sample("blocky_cache_entries", &[], "1523")
            .help("blocky_query_total", "Number of total queries", "counter")
            .sample("blocky_query_total", &[("client", "laptop"), ("type", "A")], "30")
            .sample("blocky_query_total", &[("client", "phone"), ("type", "AAAA")], "12")
            .sample(
                "blocky_response_total",
                &[("reason", "BLOCKED (ads)"), ("response_type", "BLOCKED")],
                "7",
            )
            .sample(
                "blocky_response_total",
                &[("reason", "CACHED"), ("response_type", "CACHED")],
                "20",
            )
            .sample("blocky_denylist_cache_entries", &[("group", "ads")], "84211")
            .sample("blocky_blocking_enabled", &[], "1")
            .sample("blocky_last_list_group_refresh_timestamp_seconds", &[], "1.7e9")
            .sample("go_goroutines", &[], "42")
    }

    pub fn help(mut self, name: &str, help: &str, kind: &str) -> Self {
        self.lines.push(format!("# HELP {} {}", name, help));
        self.lines.push(format!("# TYPE {} {}", name, kind));
        self
    }

    pub fn sample(mut self, name: &str, labels: &[(&str, &str)], value: &str) -> Self {
        if labels.is_empty() {
            self.lines.push(format!("{} {}", name, value));
        } else {
            let labels: Vec<String> = labels
                .iter()
                .map(|(key, value)| format!("{}=\"{}\"", key, value))
                .collect();
            self.lines.push(format!("{}{{{}}} {}", name, labels.join(","), value));
        }
        self
    }

    /// Raw line, for malformed-input tests.
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_builders() {
        let status = StatusPayload::disabled(300, &["ads"]).build();
        assert_eq!(status["enabled"], false);
        assert_eq!(status["autoEnableInSec"], 300);
        assert_eq!(status["disabledGroups"][0], "ads");

        let bare = StatusPayload::enabled().without_field("disabledGroups").build();
        assert!(bare.get("disabledGroups").is_none());
    }

    #[test]
    fn test_exposition_builder() {
        let text = ExpositionBuilder::new()
            .sample("blocky_query_total", &[("client", "x"), ("type", "A")], "3")
            .build();
        assert_eq!(text, "blocky_query_total{client=\"x\",type=\"A\"} 3\n");
    }
}
