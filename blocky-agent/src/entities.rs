//! Presentation entities over a coordinator snapshot
//!
//! Entities hold no state of their own. Each one is either:
//! - `Readable`: exposes availability, a state and attributes read from the snapshot
//! - `Triggerable`: runs one control action on the coordinator
//!
//! The blocking switch is readable and additionally exposes on/off actions.

use crate::registry::CoordinatorRegistry;
use async_trait::async_trait;
use blocky_coordinator::views::{
    last_list_refresh, ListCacheBreakdown, QueryBreakdown, ResponseBreakdown,
};
use blocky_coordinator::{Coordinator, MetricValue, RecognizedMetric, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    Unavailable,
    Unknown,
    Text(String),
    Flag(bool),
    Value(MetricValue),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityState::Unavailable => f.write_str("unavailable"),
            EntityState::Unknown => f.write_str("unknown"),
            EntityState::Text(text) => f.write_str(text),
            EntityState::Flag(true) => f.write_str("on"),
            EntityState::Flag(false) => f.write_str("off"),
            EntityState::Value(value) => write!(f, "{}", value),
            EntityState::Timestamp(at) => f.write_str(&at.to_rfc3339()),
        }
    }
}

/// Identity shared by every entity of one Blocky instance.
pub struct EntityBase {
    coordinator: Arc<Coordinator>,
    key: String,
    name: String,
    unique_id: String,
}

impl EntityBase {
    fn new(coordinator: &Arc<Coordinator>, key: &str, name: &str) -> Self {
        let config = coordinator.config();
        Self {
            coordinator: Arc::clone(coordinator),
            key: key.to_string(),
            name: name.to_string(),
            unique_id: format!("{}_{}_{}", config.host, config.port, key),
        }
    }

    /// Available when the last refresh succeeded and a snapshot exists.
    fn available(&self) -> bool {
        self.coordinator.last_update_success() && self.coordinator.snapshot().is_some()
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        if self.coordinator.last_update_success() {
            self.coordinator.snapshot()
        } else {
            None
        }
    }
}

pub trait Readable: Send + Sync {
    fn base(&self) -> &EntityBase;

    fn state(&self) -> EntityState;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn unique_id(&self) -> &str {
        &self.base().unique_id
    }

    fn available(&self) -> bool {
        self.base().available()
    }

    fn attributes(&self) -> Map<String, Value> {
        Map::new()
    }
}

#[async_trait]
pub trait Triggerable: Send + Sync {
    fn base(&self) -> &EntityBase;

    /// Run the action. Failures are logged and reported as `false`.
    async fn trigger(&self) -> bool;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn unique_id(&self) -> &str {
        &self.base().unique_id
    }

    /// Short name used to pick the entity from the command line.
    fn key(&self) -> &str {
        &self.base().key
    }
}

fn to_attributes<T: Serialize>(view: &T) -> Map<String, Value> {
    match serde_json::to_value(view) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

pub struct BlockingStatusSensor {
    base: EntityBase,
}

impl Readable for BlockingStatusSensor {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn state(&self) -> EntityState {
        match self.base.snapshot() {
            Some(snapshot) => match snapshot.enabled {
                Some(true) => EntityState::Text("ON".into()),
                Some(false) => EntityState::Text("OFF".into()),
                None => EntityState::Unknown,
            },
            None => EntityState::Unavailable,
        }
    }

    fn attributes(&self) -> Map<String, Value> {
        let Some(snapshot) = self.base.snapshot() else {
            return Map::new();
        };
        to_attributes(&json!({
            "enabled": snapshot.enabled,
            "autoEnableInSec": snapshot.auto_enable_in_sec,
            "disabledGroups": snapshot.disabled_groups,
        }))
    }
}

/// Seconds until Blocky re-enables blocking on its own.
pub struct AutoEnableTimerSensor {
    base: EntityBase,
}

impl Readable for AutoEnableTimerSensor {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn state(&self) -> EntityState {
        match self.base.snapshot() {
            Some(snapshot) => match snapshot.auto_enable_in_sec {
                Some(seconds) => EntityState::Value(MetricValue::Int(seconds)),
                None => EntityState::Unknown,
            },
            None => EntityState::Unavailable,
        }
    }
}

pub struct DisabledGroupsSensor {
    base: EntityBase,
}

impl Readable for DisabledGroupsSensor {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn state(&self) -> EntityState {
        match self.base.snapshot() {
            Some(snapshot) if snapshot.disabled_groups.is_empty() => EntityState::Text("None".into()),
            Some(snapshot) => EntityState::Text(snapshot.disabled_groups.join(", ")),
            None => EntityState::Unavailable,
        }
    }

    fn attributes(&self) -> Map<String, Value> {
        let Some(snapshot) = self.base.snapshot() else {
            return Map::new();
        };
        to_attributes(&json!({
            "groups_list": snapshot.disabled_groups,
            "count": snapshot.disabled_groups.len(),
        }))
    }
}

/// One sensor per recognized Prometheus metric.
pub struct MetricSensor {
    base: EntityBase,
    metric: RecognizedMetric,
}

impl MetricSensor {
    fn display_name(metric: RecognizedMetric) -> &'static str {
        match metric {
            RecognizedMetric::CacheEntries => "Blocky Cache Entries",
            RecognizedMetric::CacheHitsTotal => "Blocky Cache Hits",
            RecognizedMetric::CacheMissCount => "Blocky Cache Misses",
            RecognizedMetric::DenylistCacheEntries => "Blocky Denylist Cache",
            RecognizedMetric::AllowlistCacheEntries => "Blocky Allowlist Cache",
            RecognizedMetric::PrefetchDomainCacheEntries => "Blocky Prefetch Domain Cache",
            RecognizedMetric::ErrorTotal => "Blocky Total Errors",
            RecognizedMetric::QueryTotal => "Blocky Total Queries",
            RecognizedMetric::ResponseTotal => "Blocky Total Responses",
            RecognizedMetric::RequestDuration => "Blocky Request Duration",
            RecognizedMetric::BlockingEnabled => "Blocky Blocking Enabled Gauge",
            RecognizedMetric::PrefetchesTotal => "Blocky Total Prefetches",
            RecognizedMetric::PrefetchHitsTotal => "Blocky Prefetch Hits",
            RecognizedMetric::FailedDownloadsTotal => "Blocky Failed Downloads",
            RecognizedMetric::LastListGroupRefresh => "Blocky Last List Refresh",
        }
    }
}

impl Readable for MetricSensor {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn available(&self) -> bool {
        self.base.coordinator.config().metrics_enabled() && self.base.available()
    }

    fn state(&self) -> EntityState {
        if !self.available() {
            return EntityState::Unavailable;
        }
        let Some(snapshot) = self.base.snapshot() else {
            return EntityState::Unavailable;
        };

        if self.metric == RecognizedMetric::LastListGroupRefresh {
            return match last_list_refresh(&snapshot.metrics) {
                Some(at) => EntityState::Timestamp(at),
                None => EntityState::Unknown,
            };
        }

        match snapshot.metrics.value(self.metric.name()) {
            Some(value) => EntityState::Value(value),
            None => EntityState::Unknown,
        }
    }

    fn attributes(&self) -> Map<String, Value> {
        if !self.available() {
            return Map::new();
        }
        let Some(snapshot) = self.base.snapshot() else {
            return Map::new();
        };

        match self.metric {
            RecognizedMetric::QueryTotal => {
                to_attributes(&QueryBreakdown::from_metrics(&snapshot.metrics))
            }
            RecognizedMetric::ResponseTotal => {
                to_attributes(&ResponseBreakdown::from_metrics(&snapshot.metrics))
            }
            RecognizedMetric::DenylistCacheEntries | RecognizedMetric::AllowlistCacheEntries => {
                to_attributes(&ListCacheBreakdown::from_metrics(&snapshot.metrics, self.metric))
            }
            _ => Map::new(),
        }
    }
}

pub struct BlockingSwitch {
    base: EntityBase,
}

impl BlockingSwitch {
    pub async fn turn_on(&self) -> bool {
        let success = self.base.coordinator.enable_blocking().await;
        if !success {
            error!("Failed to enable blocking");
        }
        success
    }

    pub async fn turn_off(&self) -> bool {
        let success = self.base.coordinator.disable_blocking(None, None).await;
        if !success {
            error!("Failed to disable blocking");
        }
        success
    }
}

impl Readable for BlockingSwitch {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    /// Unavailable while Blocky reports no blocking state.
    fn available(&self) -> bool {
        self.base
            .snapshot()
            .is_some_and(|snapshot| snapshot.enabled.is_some())
    }

    fn state(&self) -> EntityState {
        match self.base.snapshot().and_then(|snapshot| snapshot.enabled) {
            Some(enabled) => EntityState::Flag(enabled),
            None => EntityState::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    RefreshLists,
    FlushCache,
    /// Pause blocking for a Blocky duration string such as `5m`.
    DisableFor(&'static str),
}

pub struct ActionButton {
    base: EntityBase,
    action: ButtonAction,
}

#[async_trait]
impl Triggerable for ActionButton {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    async fn trigger(&self) -> bool {
        let coordinator = &self.base.coordinator;
        let success = match self.action {
            ButtonAction::RefreshLists => coordinator.refresh_lists().await,
            ButtonAction::FlushCache => coordinator.flush_cache().await,
            ButtonAction::DisableFor(duration) => {
                coordinator.disable_blocking(Some(duration), None).await
            }
        };

        if success {
            info!("{} succeeded", self.base.name);
        } else {
            error!("{} failed", self.base.name);
        }
        success
    }
}

/// Every entity of one Blocky instance.
pub struct EntitySet {
    pub sensors: Vec<Box<dyn Readable>>,
    pub switch: BlockingSwitch,
    pub buttons: Vec<Box<dyn Triggerable>>,
}

impl EntitySet {
    pub fn from_registry(registry: &CoordinatorRegistry, entry_id: &str) -> Option<Self> {
        registry.get(entry_id).map(Self::for_coordinator)
    }

    pub fn for_coordinator(coordinator: Arc<Coordinator>) -> Self {
        let c = &coordinator;
        let mut sensors: Vec<Box<dyn Readable>> = vec![
            Box::new(BlockingStatusSensor {
                base: EntityBase::new(c, "blocking_status", "Blocky Blocking Status"),
            }),
            Box::new(AutoEnableTimerSensor {
                base: EntityBase::new(c, "auto_enable_timer", "Blocky Auto Enable Timer"),
            }),
            Box::new(DisabledGroupsSensor {
                base: EntityBase::new(c, "disabled_groups", "Blocky Disabled Groups"),
            }),
        ];

        if coordinator.config().metrics_enabled() {
            for metric in RecognizedMetric::ALL {
                sensors.push(Box::new(MetricSensor {
                    base: EntityBase::new(c, metric.key(), MetricSensor::display_name(metric)),
                    metric,
                }));
            }
        }

        let button = |key: &str, name: &str, action: ButtonAction| -> Box<dyn Triggerable> {
            Box::new(ActionButton {
                base: EntityBase::new(c, key, name),
                action,
            })
        };
        let buttons = vec![
            button("refresh_lists", "Blocky Refresh Lists", ButtonAction::RefreshLists),
            button("flush_cache", "Blocky Flush Cache", ButtonAction::FlushCache),
            button("disable_5min", "Blocky Disable 5 Minutes", ButtonAction::DisableFor("5m")),
            button("disable_15min", "Blocky Disable 15 Minutes", ButtonAction::DisableFor("15m")),
            button("disable_1hour", "Blocky Disable 1 Hour", ButtonAction::DisableFor("1h")),
        ];

        Self {
            sensors,
            switch: BlockingSwitch {
                base: EntityBase::new(c, "blocking_switch", "Blocky Blocking"),
            },
            buttons,
        }
    }

    pub fn button(&self, key: &str) -> Option<&dyn Triggerable> {
        self.buttons
            .iter()
            .find(|button| button.key() == key)
            .map(|button| button.as_ref())
    }

    pub fn sensor(&self, key: &str) -> Option<&dyn Readable> {
        self.sensors
            .iter()
            .find(|sensor| sensor.base().key == key)
            .map(|sensor| sensor.as_ref())
    }

    /// One `name: state` line per readable entity, sensors first.
    pub fn render(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .sensors
            .iter()
            .map(|sensor| format!("{}: {}", sensor.name(), sensor.state()))
            .collect();
        lines.push(format!("{}: {}", self.switch.name(), self.switch.state()));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocky_coordinator::CoordinatorConfig;
    use blocky_devkit::mock_blocky::{CACHE_FLUSH_PATH, DISABLE_PATH, ENABLE_PATH};
    use blocky_devkit::{StatusPayload, TestHarness};
    use std::time::Duration;

    fn coordinator(harness: &TestHarness, metrics: bool) -> Arc<Coordinator> {
        let mut config = CoordinatorConfig::new(harness.host())
            .with_port(harness.port())
            .with_timeout(Duration::from_secs(2));
        if metrics {
            config = config.with_metrics_port(harness.port());
        }
        Arc::new(Coordinator::new(config))
    }

    #[tokio::test]
    async fn test_unavailable_before_first_refresh() {
        let harness = TestHarness::start().await.unwrap();
        let entities = EntitySet::for_coordinator(coordinator(&harness, false));

        assert_eq!(entities.sensors.len(), 3);
        for sensor in &entities.sensors {
            assert!(!sensor.available());
            assert_eq!(sensor.state(), EntityState::Unavailable);
            assert!(sensor.attributes().is_empty());
        }
        assert_eq!(entities.switch.state(), EntityState::Unavailable);
    }

    #[tokio::test]
    async fn test_status_sensors_read_snapshot() {
        let harness = TestHarness::start().await.unwrap();
        harness
            .blocky
            .set_status(200, StatusPayload::disabled(90, &["ads", "kids"]).build());
        let coordinator = coordinator(&harness, false);
        coordinator.refresh().await.unwrap();
        let entities = EntitySet::for_coordinator(coordinator);

        let status = entities.sensor("blocking_status").unwrap();
        assert_eq!(status.state(), EntityState::Text("OFF".into()));
        assert_eq!(status.attributes()["autoEnableInSec"], 90);
        assert_eq!(status.unique_id(), format!("{}_{}_blocking_status", harness.host(), harness.port()));

        let timer = entities.sensor("auto_enable_timer").unwrap();
        assert_eq!(timer.state(), EntityState::Value(MetricValue::Int(90)));

        let groups = entities.sensor("disabled_groups").unwrap();
        assert_eq!(groups.state().to_string(), "ads, kids");
        assert_eq!(groups.attributes()["count"], 2);

        assert_eq!(entities.switch.state(), EntityState::Flag(false));
    }

    #[tokio::test]
    async fn test_missing_enabled_reads_unknown() {
        let harness = TestHarness::start().await.unwrap();
        harness.blocky.set_status(
            200,
            StatusPayload::disabled(5, &[])
                .without_field("enabled")
                .with_field("disabledGroups", serde_json::Value::Null)
                .build(),
        );
        let coordinator = coordinator(&harness, false);
        coordinator.refresh().await.unwrap();
        let entities = EntitySet::for_coordinator(coordinator);

        let status = entities.sensor("blocking_status").unwrap();
        assert!(status.available());
        assert_eq!(status.state(), EntityState::Unknown);
        assert_eq!(status.state().to_string(), "unknown");
        assert_eq!(status.attributes()["enabled"], serde_json::Value::Null);

        assert_eq!(
            entities.sensor("auto_enable_timer").unwrap().state(),
            EntityState::Value(MetricValue::Int(5))
        );
        assert!(!entities.switch.available());
        assert_eq!(entities.switch.state(), EntityState::Unavailable);
    }

    #[tokio::test]
    async fn test_disabled_groups_none_when_empty() {
        let harness = TestHarness::start().await.unwrap();
        let coordinator = coordinator(&harness, false);
        coordinator.refresh().await.unwrap();
        let entities = EntitySet::for_coordinator(coordinator);

        assert_eq!(
            entities.sensor("disabled_groups").unwrap().state(),
            EntityState::Text("None".into())
        );
        assert_eq!(
            entities.sensor("auto_enable_timer").unwrap().state(),
            EntityState::Unknown
        );
    }

    #[tokio::test]
    async fn test_metric_sensors() {
        let harness = TestHarness::start().await.unwrap();
        let coordinator = coordinator(&harness, true);
        coordinator.refresh().await.unwrap();
        let entities = EntitySet::for_coordinator(coordinator);

        assert_eq!(entities.sensors.len(), 3 + RecognizedMetric::ALL.len());

        let queries = entities.sensor("query_total").unwrap();
        assert_eq!(queries.state(), EntityState::Value(MetricValue::Int(42)));
        assert_eq!(queries.attributes()["by_client"]["laptop"], 30);

        let responses = entities.sensor("response_total").unwrap();
        assert_eq!(responses.attributes()["blocked"], 7);
        assert_eq!(responses.attributes()["cached"], 20);

        let denylist = entities.sensor("denylist_cache_entries").unwrap();
        assert_eq!(denylist.attributes()["by_group"]["ads"], 84211);

        let refreshed = entities.sensor("last_list_group_refresh").unwrap();
        assert!(matches!(refreshed.state(), EntityState::Timestamp(_)));

        let misses = entities.sensor("cache_miss_count").unwrap();
        assert_eq!(misses.state(), EntityState::Unknown);
    }

    #[tokio::test]
    async fn test_buttons_and_switch_trigger_actions() {
        let harness = TestHarness::start().await.unwrap();
        let coordinator = coordinator(&harness, false);
        let entities = EntitySet::for_coordinator(coordinator);

        let disable = entities.button("disable_15min").unwrap();
        assert!(disable.trigger().await);
        let request = harness.blocky.last_request(DISABLE_PATH).unwrap();
        assert_eq!(request.query.get("duration").map(String::as_str), Some("15m"));

        assert!(entities.button("flush_cache").unwrap().trigger().await);
        assert_eq!(harness.blocky.hits(CACHE_FLUSH_PATH), 1);
        assert!(entities.button("missing").is_none());

        assert!(entities.switch.turn_on().await);
        assert_eq!(harness.blocky.hits(ENABLE_PATH), 1);
        assert!(entities.switch.turn_off().await);
        assert!(harness.blocky.last_request(DISABLE_PATH).unwrap().query.is_empty());
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = CoordinatorRegistry::new();
        registry.insert(Arc::new(Coordinator::new(CoordinatorConfig::new("dns.lan"))));

        let entities = EntitySet::from_registry(&registry, "dns.lan:4000").unwrap();
        assert_eq!(entities.buttons.len(), 5);
        assert!(EntitySet::from_registry(&registry, "other:4000").is_none());
    }
}
