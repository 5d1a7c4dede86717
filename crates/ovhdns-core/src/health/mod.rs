//! Fixed-interval health polling
//!
//! The poller probes one URL until it answers `200` or the attempt budget
//! runs out. The interval is flat: no backoff, no jitter.
//!
//! ## Flow
//!
//! ```text
//! attempt 1 ──► 200? ──yes──► healthy
//!                 │
//!                 no (status or connection failure)
//!                 ▼
//!            warn + sleep(delay)
//!                 ▼
//! attempt 2 ──► ... ──► attempt N fails ──► sleep(delay) ──► unhealthy
//! ```

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::traits::{HealthProbe, Sleeper};

/// Default attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default delay between attempts
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Status code that counts as healthy
const HEALTHY_STATUS: u16 = 200;

/// Fixed-count, fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of probes before giving up, at least 1
    pub max_attempts: u32,
    /// Wait after each failed probe
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

/// Outcome of polling one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub url: String,
    pub healthy: bool,
    /// Number of probes issued
    pub attempts: u32,
}

/// Polls an endpoint with an injected probe, sleeper and policy
pub struct HealthPoller {
    probe: Box<dyn HealthProbe>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
}

impl HealthPoller {
    pub fn new(probe: Box<dyn HealthProbe>, sleeper: Box<dyn Sleeper>, policy: RetryPolicy) -> Self {
        Self {
            probe,
            sleeper,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Probe `url` until it is healthy or the attempt budget is exhausted
    pub async fn poll(&self, url: &str) -> HealthReport {
        info!("Testing health for {}", url);
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.probe.probe(url).await {
                Ok(HEALTHY_STATUS) => {
                    info!("Service {} is healthy (attempt {})", url, attempt);
                    return HealthReport {
                        url: url.to_string(),
                        healthy: true,
                        attempts: attempt,
                    };
                }
                Ok(status) => {
                    warn!("Attempt {}: Service returned {}", attempt, status);
                }
                Err(e) => {
                    warn!("Attempt {}: Connection failed: {}", attempt, e);
                }
            }

            self.sleeper.sleep(self.policy.delay).await;
        }

        error!(
            "Service {} is not healthy after {} attempts",
            url, max_attempts
        );
        HealthReport {
            url: url.to_string(),
            healthy: false,
            attempts: max_attempts,
        }
    }
}
