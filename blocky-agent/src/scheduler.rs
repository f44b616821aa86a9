//! Periodic polling of one coordinator
//!
//! The first refresh must succeed before the entry is considered set up.
//! After that, a failed poll only marks the entities unavailable until a later
//! poll succeeds.

use anyhow::{bail, Result};
use blocky_coordinator::{Coordinator, RefreshError, Snapshot};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct Scheduler {
    coordinator: Arc<Coordinator>,
    consecutive_failures: u32,
}

impl Scheduler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Initial refresh; failure aborts setup of the entry.
    pub async fn first_refresh(&mut self) -> Result<Arc<Snapshot>> {
        match self.coordinator.refresh().await {
            Ok(snapshot) => {
                info!(
                    "Connected to Blocky at {} (blocking {})",
                    self.coordinator.config().entry_id(),
                    match snapshot.enabled {
                        Some(true) => "enabled",
                        Some(false) => "disabled",
                        None => "unknown",
                    }
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                bail!(
                    "Unable to connect to Blocky at {}: {}",
                    self.coordinator.config().entry_id(),
                    e
                )
            }
        }
    }

    /// One scheduled poll.
    pub async fn tick(&mut self) -> Result<Arc<Snapshot>, RefreshError> {
        let result = self.coordinator.refresh().await;
        match &result {
            Ok(_) => {
                if self.consecutive_failures > 0 {
                    info!(
                        "Blocky at {} recovered after {} failed polls",
                        self.coordinator.config().entry_id(),
                        self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
            }
            Err(e) => {
                self.consecutive_failures += 1;
                debug!("Poll {} failed: {}", self.consecutive_failures, e.kind());
            }
        }
        result
    }

    /// Poll every refresh interval until `shutdown` resolves. Missed ticks are skipped.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.coordinator.config().refresh_interval;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "Polling {} every {}s",
            self.coordinator.config().entry_id(),
            period.as_secs_f64()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping poller for {}", self.coordinator.config().entry_id());
                    break;
                }
                _ = timer.tick() => {
                    if self.tick().await.is_err() && self.consecutive_failures() == 3 {
                        warn!(
                            "Blocky at {} has failed 3 polls in a row",
                            self.coordinator.config().entry_id()
                        );
                    }
                }
            }
        }
    }
}
