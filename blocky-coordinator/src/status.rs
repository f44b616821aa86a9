//! Normalization of the `/api/blocking/status` payload

use serde_json::{Map, Value};

pub const ATTR_ENABLED: &str = "enabled";
pub const ATTR_AUTO_ENABLE_IN_SEC: &str = "autoEnableInSec";
pub const ATTR_DISABLED_GROUPS: &str = "disabledGroups";

/// Make sure `disabledGroups` is always an array.
///
/// Absent, `null` or non-array values become `[]`. Every other field passes
/// through untouched, including absent ones.
pub fn normalize_status(mut status: Map<String, Value>) -> Map<String, Value> {
    let is_array = matches!(status.get(ATTR_DISABLED_GROUPS), Some(Value::Array(_)));
    if !is_array {
        status.insert(ATTR_DISABLED_GROUPS.to_string(), Value::Array(Vec::new()));
    }
    status
}

/// Typed view over a normalized status object.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockingStatus {
    /// `None` when Blocky sent no boolean `enabled`.
    pub enabled: Option<bool>,
    pub auto_enable_in_sec: Option<i64>,
    pub disabled_groups: Vec<String>,
}

impl BlockingStatus {
    pub fn from_normalized(status: &Map<String, Value>) -> Self {
        let enabled = status.get(ATTR_ENABLED).and_then(Value::as_bool);
        let auto_enable_in_sec = status.get(ATTR_AUTO_ENABLE_IN_SEC).and_then(Value::as_i64);
        let disabled_groups = match status.get(ATTR_DISABLED_GROUPS) {
            Some(Value::Array(groups)) => groups
                .iter()
                .map(|group| match group {
                    Value::String(name) => name.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            enabled,
            auto_enable_in_sec,
            disabled_groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn test_disabled_groups_defaults_to_empty() {
        for payload in [
            json!({"enabled": true}),
            json!({"enabled": true, "disabledGroups": null}),
            json!({"enabled": true, "disabledGroups": "ads"}),
            json!({"enabled": true, "disabledGroups": 3}),
            json!({"enabled": true, "disabledGroups": {"ads": true}}),
        ] {
            let normalized = normalize_status(object(payload));
            assert_eq!(normalized[ATTR_DISABLED_GROUPS], json!([]));
            assert_eq!(normalized[ATTR_ENABLED], json!(true));
        }
    }

    #[test]
    fn test_other_fields_pass_through() {
        let normalized = normalize_status(object(json!({
            "enabled": false,
            "autoEnableInSec": 120,
            "disabledGroups": ["ads", "kids"],
            "extra": "kept"
        })));
        assert_eq!(normalized["disabledGroups"], json!(["ads", "kids"]));
        assert_eq!(normalized["extra"], json!("kept"));
        assert!(!normalized.contains_key("missing"));
    }

    #[test]
    fn test_typed_view() {
        let normalized = normalize_status(object(json!({
            "enabled": false,
            "autoEnableInSec": 300,
            "disabledGroups": ["ads", 7]
        })));
        let status = BlockingStatus::from_normalized(&normalized);
        assert_eq!(status.enabled, Some(false));
        assert_eq!(status.auto_enable_in_sec, Some(300));
        assert_eq!(status.disabled_groups, vec!["ads".to_string(), "7".to_string()]);

        let missing = normalize_status(object(json!({"autoEnableInSec": 5, "disabledGroups": null})));
        let status = BlockingStatus::from_normalized(&missing);
        assert_eq!(status.enabled, None);
        assert_eq!(status.auto_enable_in_sec, Some(5));
        assert!(status.disabled_groups.is_empty());

        let not_bool = normalize_status(object(json!({"enabled": "yes"})));
        assert_eq!(BlockingStatus::from_normalized(&not_bool).enabled, None);
    }
}
