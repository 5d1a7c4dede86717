// # Health Probe and Sleeper Traits
//
// The health poller talks to the outside world through two seams: a probe
// that performs one HTTP request, and a sleeper that waits between attempts.
// Tests replace both, so polling never needs a real endpoint or a real clock.

use async_trait::async_trait;
use std::time::Duration;

/// One health request against an endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Issue one request and return the HTTP status code
    ///
    /// # Returns
    ///
    /// - `Ok(status)`: the endpoint answered, whatever the status
    /// - `Err(Error)`: the connection could not be made
    async fn probe(&self, url: &str) -> Result<u16, crate::Error>;
}

/// Fixed wait between polling attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
