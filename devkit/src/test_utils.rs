/*!
Test harness around the mock Blocky

Facilitates coordinator and agent tests with:
- Automatic logging setup and mock server startup
- Hit-count expectations per endpoint
- Polling helpers for asynchronous side effects
*/

use crate::mock_blocky::MockBlocky;
use std::collections::HashMap;
use std::time::Duration;
use anyhow::Result;

pub struct TestHarness {
    pub blocky: MockBlocky,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    path: String,
    expected_hits: usize,
}

impl TestHarness {
    /// Start a fresh mock Blocky with default replies.
    pub async fn start() -> Result<Self> {
        env_logger::builder().is_test(true).try_init().ok();

        Ok(Self {
            blocky: MockBlocky::start().await?,
            expectations: Vec::new(),
        })
    }

    pub fn host(&self) -> String {
        self.blocky.host()
    }

    pub fn port(&self) -> u16 {
        self.blocky.port()
    }

    /// Expect exactly `count` requests on `path` by the time of verification.
    pub fn expect_hits(&mut self, path: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            path: path.to_string(),
            expected_hits: count,
        });
        self
    }

    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual = self.blocky.hits(&expectation.path);
            if actual != expectation.expected_hits {
                anyhow::bail!(
                    "Expectation failed for '{}': expected {} requests, got {}",
                    expectation.path,
                    expectation.expected_hits,
                    actual
                );
            }
            log::info!("[HARNESS] '{}': {} requests as expected", expectation.path, actual);
        }
        Ok(())
    }

    /// Poll until `path` has seen at least `count` requests or the timeout expires.
    pub async fn wait_for_hits(&self, path: &str, count: usize, timeout_ms: u64) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if self.blocky.hits(path) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        log::warn!("[HARNESS] timeout waiting for {} hits on {}", count, path);
        false
    }

    pub fn get_stats(&self) -> TestStats {
        let mut path_counts = HashMap::new();
        for request in self.blocky.get_requests() {
            *path_counts.entry(request.path).or_insert(0) += 1;
        }
        TestStats { path_counts }
    }

    pub fn reset(&mut self) {
        self.blocky.clear();
        self.expectations.clear();
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub path_counts: HashMap<String, usize>,
}

impl TestStats {
    pub fn total_requests(&self) -> usize {
        self.path_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_blocky::STATUS_PATH;

    #[tokio::test]
    async fn test_harness_expectations() {
        let mut harness = TestHarness::start().await.unwrap();
        harness.expect_hits(STATUS_PATH, 1);
        assert!(harness.verify_expectations().is_err());

        let url = format!("http://{}:{}{}", harness.host(), harness.port(), STATUS_PATH);
        reqwest::get(url).await.unwrap();

        assert!(harness.wait_for_hits(STATUS_PATH, 1, 1000).await);
        harness.verify_expectations().unwrap();
        assert_eq!(harness.get_stats().total_requests(), 1);

        harness.reset();
        assert_eq!(harness.get_stats().total_requests(), 0);
    }
}
