//! Polling coordinator for a single Blocky instance
//!
//! Responsibilities:
//! - One refresh cycle: status (mandatory) then metrics (best-effort)
//! - Deadline enforcement on every network call
//! - Classification of status failures into `RefreshError`
//! - Atomic replacement of the shared `Snapshot`
//! - Control actions that mutate Blocky and re-poll after a settling delay
//!
//! Scheduling is external: something else decides when `refresh` runs.

use crate::config::CoordinatorConfig;
use crate::error::RefreshError;
use crate::metrics::MetricSet;
use crate::prometheus::parse_metrics;
use crate::snapshot::Snapshot;
use crate::status::{normalize_status, BlockingStatus};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Wait after a successful enable/disable before re-polling, so Blocky has applied the change.
pub const SETTLING_DELAY: Duration = Duration::from_millis(500);

/// List downloads are slow: refreshing lists gets this multiple of the base timeout.
const LIST_REFRESH_TIMEOUT_FACTOR: u32 = 3;

/// Outcome bookkeeping of the most recent refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshState {
    pub last_update_success: bool,
    pub last_error: Option<RefreshError>,
    pub last_success_at: Option<DateTime<Utc>>,
}

pub struct Coordinator {
    config: CoordinatorConfig,
    client: Client,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    state: Mutex<RefreshState>,
    // Serializes refresh cycles; overlapping callers queue instead of racing.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Build with a caller-provided HTTP client (shared connection pool).
    pub fn with_client(config: CoordinatorConfig, client: Client) -> Self {
        Self {
            config,
            client,
            snapshot: RwLock::new(None),
            state: Mutex::new(RefreshState::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Latest successfully installed snapshot, if any refresh ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().clone()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.state.lock().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.state.lock().last_update_success
    }

    pub fn last_error(&self) -> Option<RefreshError> {
        self.state.lock().last_error.clone()
    }

    /// Run one refresh cycle.
    ///
    /// On success the new snapshot replaces the previous one. On failure the
    /// previous snapshot is kept and the error is recorded.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let _cycle = self.refresh_gate.lock().await;

        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.snapshot.write() = Some(Arc::clone(&snapshot));

                let mut state = self.state.lock();
                state.last_update_success = true;
                state.last_error = None;
                state.last_success_at = Some(snapshot.fetched_at);
                Ok(snapshot)
            }
            Err(err) => {
                match &err {
                    RefreshError::Unexpected(_) => {
                        error!("Unexpected error fetching data from {}: {}", self.config.entry_id(), err)
                    }
                    _ => warn!("Refresh of {} failed: {}", self.config.entry_id(), err),
                }

                let mut state = self.state.lock();
                state.last_update_success = false;
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, RefreshError> {
        let raw = self.fetch_status().await?;
        debug!("Received data from Blocky API: {:?}", raw);

        let normalized = normalize_status(raw);
        let status = BlockingStatus::from_normalized(&normalized);

        let metrics = self.metrics_or_empty().await;
        Ok(Snapshot::new(status, normalized, metrics))
    }

    async fn fetch_status(&self) -> Result<Map<String, Value>, RefreshError> {
        let timeout = self.config.timeout;
        let request = self.client.get(self.api_url("blocking/status"));

        self.within(timeout, async move {
            let response = request
                .send()
                .await
                .map_err(|e| RefreshError::from_reqwest(e, timeout))?;
            if response.status() != StatusCode::OK {
                return Err(RefreshError::BadStatus(response.status().as_u16()));
            }
            match response.json::<Value>().await {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(RefreshError::Unexpected(format!(
                    "status payload is not a JSON object: {}",
                    other
                ))),
                Err(e) => Err(RefreshError::from_reqwest(e, timeout)),
            }
        })
        .await
    }

    /// Metrics are best-effort: any failure yields an empty set for this cycle.
    async fn metrics_or_empty(&self) -> MetricSet {
        let Some(url) = self.config.metrics_url() else {
            return MetricSet::new();
        };

        match self.fetch_metrics(&url).await {
            Ok(metrics) => {
                debug!("Parsed {} recognized metrics from {}", metrics.len(), url);
                metrics
            }
            Err(err) => {
                warn!("Metrics fetch from {} failed, continuing without metrics: {}", url, err);
                MetricSet::new()
            }
        }
    }

    async fn fetch_metrics(&self, url: &str) -> Result<MetricSet, RefreshError> {
        let timeout = self.config.timeout;
        let request = self.client.get(url);

        self.within(timeout, async move {
            let response = request
                .send()
                .await
                .map_err(|e| RefreshError::from_reqwest(e, timeout))?;
            if response.status() != StatusCode::OK {
                return Err(RefreshError::BadStatus(response.status().as_u16()));
            }
            let text = response
                .text()
                .await
                .map_err(|e| RefreshError::from_reqwest(e, timeout))?;
            Ok(parse_metrics(&text))
        })
        .await
    }

    /// Enable blocking. True only on a 200; a refresh follows the settling delay.
    pub async fn enable_blocking(&self) -> bool {
        let request = self.client.get(self.api_url("blocking/enable"));
        let success = self
            .expect_ok("enable blocking", request, self.config.timeout)
            .await;
        if success {
            self.settle_and_refresh().await;
        }
        success
    }

    /// Disable blocking, optionally for a duration (`5m`, `1h`, ...) and for specific groups.
    pub async fn disable_blocking(&self, duration: Option<&str>, groups: Option<&str>) -> bool {
        let mut params = Vec::new();
        if let Some(duration) = duration.filter(|d| !d.is_empty()) {
            params.push(("duration", duration));
        }
        if let Some(groups) = groups.filter(|g| !g.is_empty()) {
            params.push(("groups", groups));
        }

        let mut request = self.client.get(self.api_url("blocking/disable"));
        if !params.is_empty() {
            request = request.query(&params);
        }

        let success = self
            .expect_ok("disable blocking", request, self.config.timeout)
            .await;
        if success {
            self.settle_and_refresh().await;
        }
        success
    }

    /// Ask Blocky to re-download its lists. No snapshot side effect.
    pub async fn refresh_lists(&self) -> bool {
        let request = self.client.post(self.api_url("lists/refresh"));
        let timeout = self.config.timeout * LIST_REFRESH_TIMEOUT_FACTOR;
        self.expect_ok("refresh lists", request, timeout).await
    }

    pub async fn flush_cache(&self) -> bool {
        let request = self.client.post(self.api_url("cache/flush"));
        self.expect_ok("flush cache", request, self.config.timeout)
            .await
    }

    /// Resolve `query` through Blocky. `None` on any failure or non-200 answer.
    pub async fn query_dns(&self, query: &str, query_type: &str) -> Option<Value> {
        let timeout = self.config.timeout;
        let request = self
            .client
            .post(self.api_url("query"))
            .json(&json!({ "query": query, "type": query_type }));

        let result = self
            .within(timeout, async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| RefreshError::from_reqwest(e, timeout))?;
                if response.status() != StatusCode::OK {
                    return Err(RefreshError::BadStatus(response.status().as_u16()));
                }
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| RefreshError::from_reqwest(e, timeout))
            })
            .await;

        match result {
            Ok(answer) => Some(answer),
            Err(err) => {
                warn!("DNS query {} {} failed: {}", query_type, query, err);
                None
            }
        }
    }

    async fn expect_ok(&self, action: &str, request: RequestBuilder, timeout: Duration) -> bool {
        let result = self
            .within(timeout, async move {
                request
                    .send()
                    .await
                    .map(|response| response.status())
                    .map_err(|e| RefreshError::from_reqwest(e, timeout))
            })
            .await;

        match result {
            Ok(status) if status == StatusCode::OK => {
                info!("{} succeeded on {}", action, self.config.entry_id());
                true
            }
            Ok(status) => {
                warn!("{} rejected by {}: HTTP {}", action, self.config.entry_id(), status);
                false
            }
            Err(err) => {
                warn!("{} failed on {}: {}", action, self.config.entry_id(), err);
                false
            }
        }
    }

    async fn settle_and_refresh(&self) {
        tokio::time::sleep(SETTLING_DELAY).await;
        if let Err(err) = self.refresh().await {
            debug!("Refresh after control action failed: {}", err);
        }
    }

    async fn within<T, F>(&self, timeout: Duration, call: F) -> Result<T, RefreshError>
    where
        F: Future<Output = Result<T, RefreshError>>,
    {
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| RefreshError::Timeout(timeout))?
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_urls() {
        let coordinator = Coordinator::new(CoordinatorConfig::new("dns.lan").with_port(4001));
        assert_eq!(
            coordinator.api_url("blocking/status"),
            "http://dns.lan:4001/api/blocking/status"
        );
        assert!(coordinator.snapshot().is_none());
        assert!(!coordinator.last_update_success());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_failure() {
        let coordinator = Coordinator::new(
            CoordinatorConfig::new("127.0.0.1")
                .with_port(1)
                .with_timeout(Duration::from_secs(2)),
        );
        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Transport(_)), "got {err:?}");
        assert_eq!(coordinator.last_error(), Some(err));
        assert!(!coordinator.enable_blocking().await);
        assert!(coordinator.query_dns("example.com", "A").await.is_none());
    }
}
