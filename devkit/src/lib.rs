//! # Blocky DevKit - Test doubles for the Blocky HTTP API
//!
//! Lets the coordinator and agent be tested without a running Blocky:
//! - In-process mock of the `/api` routes and the `/metrics` endpoint
//! - Builders for status payloads and Prometheus exposition text
//! - A harness with hit-count expectations

pub mod fixtures;
pub mod mock_blocky;
pub mod test_utils;

pub use fixtures::{ExpositionBuilder, StatusPayload};
pub use mock_blocky::{MockBlocky, RecordedRequest, Reply};
pub use test_utils::TestHarness;
