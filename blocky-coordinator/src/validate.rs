//! One-shot reachability check run before a coordinator is created
//!
//! Distinguishes "cannot connect" from "connected but the payload is not a
//! Blocky status" so the user gets a precise reason.

use crate::config::CoordinatorConfig;
use crate::error::SetupError;
use crate::status::ATTR_ENABLED;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Validation ignores the configured timeout and always uses this one.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    pub title: String,
    pub entry_id: String,
}

/// Check that the status endpoint answers with a status object and, when
/// metrics are configured, that the metrics endpoint answers 200.
pub async fn validate_connection(
    client: &Client,
    config: &CoordinatorConfig,
) -> Result<ValidatedEntry, SetupError> {
    let url = format!("{}/blocking/status", config.base_url());
    debug!("Validating Blocky status endpoint at {}", url);

    let payload = tokio::time::timeout(VALIDATION_TIMEOUT, async {
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| SetupError::CannotConnect(format!("cannot connect to Blocky: {}", e)))?;
        if response.status() != StatusCode::OK {
            return Err(SetupError::CannotConnect(format!(
                "API returned non-200 status {}",
                response.status()
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| SetupError::InvalidResponse(format!("status body is not JSON: {}", e)))
    })
    .await
    .map_err(|_| SetupError::CannotConnect(format!("timed out after {:?}", VALIDATION_TIMEOUT)))??;

    if payload.get(ATTR_ENABLED).is_none() {
        return Err(SetupError::InvalidResponse(
            "status payload has no `enabled` field".to_string(),
        ));
    }

    if let Some(metrics_url) = config.metrics_url() {
        debug!("Validating Prometheus endpoint at {}", metrics_url);
        let status = tokio::time::timeout(VALIDATION_TIMEOUT, client.get(&metrics_url).send())
            .await
            .map_err(|_| {
                SetupError::CannotConnect("Prometheus metrics endpoint timed out".to_string())
            })?
            .map_err(|_| {
                SetupError::CannotConnect("cannot connect to Prometheus metrics endpoint".to_string())
            })?
            .status();
        if status != StatusCode::OK {
            return Err(SetupError::CannotConnect(format!(
                "Prometheus metrics endpoint not accessible (HTTP {})",
                status
            )));
        }
    }

    Ok(ValidatedEntry {
        title: format!("Blocky ({}:{})", config.host, config.port),
        entry_id: config.entry_id(),
    })
}
