// # HTTP Collaborators
//
// This crate provides the network-facing collaborators that are not the
// registrar itself:
//
// - [`HttpIpSource`]: public IPv4 discovery through a plain-text lookup service
// - [`HttpHealthProbe`]: one GET against a health endpoint
// - [`port_available`]: local port check used by the diagnostics command
//
// ## Architecture
//
// Every call is single-shot. Retries exist only in the health poller
// (`ovhdns_core::health`), which drives [`HttpHealthProbe`].

use async_trait::async_trait;
use ovhdns_core::mask::mask;
use ovhdns_core::traits::{HealthProbe, IpSource};
use ovhdns_core::{Error, Result};

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default timeout for IP lookups
const IP_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single health probe
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {e}")))
}

/// HTTP-based public IP source
///
/// Expects the service to answer with the bare address as text, the way
/// `https://api.ipify.org` does. Only IPv4 answers are accepted since the
/// reconciler manages A records only.
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: lookup URL (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: build_client(IP_LOOKUP_TIMEOUT)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {}", e)))?;
        let ip_text = ip_text.trim();

        let ip: Ipv4Addr = ip_text.parse().map_err(|_| {
            Error::ip_source(format!("Not an IPv4 address: {}", mask(ip_text)))
        })?;

        tracing::info!("Public IP is {}", mask(&ip.to_string()));
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Health probe issuing one GET per call
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new() -> Result<Self> {
        Self::with_timeout(HEALTH_PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// True when `127.0.0.1:port` can be bound, i.e. nothing listens on it
pub async fn port_available(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match tokio::net::TcpListener::bind(addr).await {
        Ok(_listener) => true,
        Err(e) => {
            tracing::debug!("Port {} unavailable: {}", port, e);
            false
        }
    }
}
