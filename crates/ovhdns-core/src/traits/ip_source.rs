// # IP Source Trait
//
// Defines the interface for discovering the public IPv4 address that the
// managed A records should point at.
//
// ## Implementations
//
// - HTTP lookup: `ovhdns-http` crate (`HttpIpSource`)
// - Configured override: [`StaticIpSource`] (`IP_ADDRESS`)

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP discovery
///
/// One blocking lookup per call, no caching and no polling loop: the
/// address is read once per reconciliation run.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IPv4 address
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Short name used in logs
    fn source_name(&self) -> &'static str;
}

/// IP source backed by a locally configured address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpSource {
    ip: Ipv4Addr,
}

impl StaticIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self { ip }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Parse a configured override such as `IP_ADDRESS=91.173.110.4`
    pub fn parse(value: &str) -> Result<Self, crate::Error> {
        value
            .trim()
            .parse()
            .map(Self::new)
            .map_err(|_| crate::Error::config(format!("IP_ADDRESS is not an IPv4 address: {value}")))
    }
}

#[async_trait]
impl IpSource for StaticIpSource {
    async fn current(&self) -> Result<Ipv4Addr, crate::Error> {
        Ok(self.ip)
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_parse() {
        let source = StaticIpSource::parse(" 91.173.110.4 ").unwrap();
        let ip = tokio_test::block_on(source.current()).unwrap();
        assert_eq!(ip, Ipv4Addr::new(91, 173, 110, 4));
    }

    #[test]
    fn test_static_source_rejects_ipv6() {
        let err = StaticIpSource::parse("2001:db8::1").unwrap_err();
        assert!(err.is_config());
    }
}
