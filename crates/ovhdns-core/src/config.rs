//! Configuration sources and typed configuration
//!
//! Configuration is a flat mapping from named keys (`OVH_DNS_ZONE`,
//! `OVH_DNS_SUBDOMAIN`, ...) to strings. A [`ConfigSource`] provides the
//! lookups; the typed structs ([`DnsConfig`], [`HealthConfig`]) are built
//! from a source once at process start and passed down explicitly.
//!
//! Every typed `from_source` checks all of its required keys before
//! returning, so a missing key is reported before any network call.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::health::RetryPolicy;
use crate::mask::mask;
use crate::reconcile::ReconcilePolicy;
use crate::types::DesiredState;

/// Registrar application key
pub const OVH_APPLICATION_KEY: &str = "OVH_APPLICATION_KEY";
/// Registrar application secret
pub const OVH_APPLICATION_SECRET: &str = "OVH_APPLICATION_SECRET";
/// Registrar consumer key
pub const OVH_CONSUMER_KEY: &str = "OVH_CONSUMER_KEY";
/// Registrar endpoint name or base URL
pub const OVH_API_ENDPOINT: &str = "OVH_API_ENDPOINT";
/// Zone under management
pub const OVH_DNS_ZONE: &str = "OVH_DNS_ZONE";
/// Primary managed subdomain
pub const OVH_DNS_SUBDOMAIN: &str = "OVH_DNS_SUBDOMAIN";
/// Comma-separated extra managed subdomains
pub const DYNDNS_ADDITIONAL_SUBDOMAINS: &str = "DYNDNS_ADDITIONAL_SUBDOMAINS";
/// AAAA target that is always deleted from managed subdomains
pub const OVH_DISALLOWED_AAAA_TARGET: &str = "OVH_DISALLOWED_AAAA_TARGET";
/// TTL applied to created and updated A records
pub const OVH_RECORD_TTL: &str = "OVH_RECORD_TTL";
/// Public IP override, skips the HTTP lookup
pub const IP_ADDRESS: &str = "IP_ADDRESS";
/// Public IP lookup endpoint
pub const IP_LOOKUP_URL: &str = "IP_LOOKUP_URL";
/// Health poll attempt budget
pub const HEALTH_MAX_RETRIES: &str = "HEALTH_MAX_RETRIES";
/// Health poll delay between attempts
pub const HEALTH_DELAY_SECS: &str = "HEALTH_DELAY_SECS";
/// Comma-separated health endpoints
pub const HEALTH_URLS: &str = "HEALTH_URLS";
/// Comma-separated local ports checked by `diagnose`
pub const DIAGNOSTIC_PORTS: &str = "DIAGNOSTIC_PORTS";

/// Subdomain value that selects the zone apex
pub const APEX_MARKER: &str = "@";

/// Default registrar endpoint
pub const DEFAULT_ENDPOINT: &str = "ovh-eu";
/// Default public IP lookup endpoint
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org";

/// Keys whose values never appear unmasked in logs
pub fn is_sensitive_key(key: &str) -> bool {
    key == IP_ADDRESS
        || ["KEY", "SECRET", "PASSWORD", "TOKEN"]
            .iter()
            .any(|marker| key.contains(marker))
}

/// A mapping from configuration keys to string values
pub trait ConfigSource: Send + Sync {
    /// Look up a key, `None` when absent
    fn get(&self, key: &str) -> Option<String>;

    /// Look up a key that must be present and non-empty
    fn get_required(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => {
                if is_sensitive_key(key) {
                    debug!("Configuration {} = {}", key, mask(&value));
                } else {
                    debug!("Configuration {} = {}", key, value);
                }
                Ok(value)
            }
            _ => Err(Error::config(format!(
                "missing required configuration: {key}"
            ))),
        }
    }

    /// Look up a key, falling back to `default` when absent or empty
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

/// Fail with one error naming every missing key
pub fn check_required(source: &dyn ConfigSource, keys: &[&str]) -> Result<()> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| source.get(key).is_none_or(|value| value.trim().is_empty()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::config(format!(
            "missing required configuration: {}",
            missing.join(", ")
        )))
    }
}

/// Parse an optional key, a present but unparsable value is an error
pub fn get_parsed<T>(source: &dyn ConfigSource, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match source.get(key).filter(|value| !value.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config(format!("{key} has an invalid value '{raw}': {e}"))),
    }
}

/// Split a comma-separated value, trimming entries and dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Map a configured subdomain to its record form, [`APEX_MARKER`] being the apex
pub fn sub_domain_from(value: &str) -> String {
    match value.trim() {
        APEX_MARKER => String::new(),
        other => other.to_string(),
    }
}

/// Process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory source, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for MapSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// `KEY=VALUE` file in the `.env` style
///
/// Blank lines and lines starting with `#` are skipped, each remaining line
/// is split on its first `=`, key and value are trimmed and one pair of
/// matching single or double quotes around the value is removed.
#[derive(Debug, Clone)]
pub struct DotenvSource {
    path: PathBuf,
    values: MapSource,
}

impl DotenvSource {
    /// Read and parse a dotenv file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let values = Self::parse(&contents)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded configuration file {}", path.display());
        Ok(Self { path, values })
    }

    /// Parse dotenv contents
    pub fn parse(contents: &str) -> std::result::Result<MapSource, String> {
        let mut values = MapSource::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| format!("line {}: expected KEY=VALUE", index + 1))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("line {}: empty key", index + 1));
            }
            values = values.with(key, unquote(value.trim()));
        }
        Ok(values)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for DotenvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key)
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Sources consulted in order, the first one holding a key wins
#[derive(Default)]
pub struct LayeredSource {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, source: impl ConfigSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl ConfigSource for LayeredSource {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }
}

/// Registrar credentials and endpoint
///
/// The Debug implementation masks every credential.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrarConfig {
    /// Endpoint name (`ovh-eu`, `ovh-ca`, ...) or base URL
    pub endpoint: String,
    pub application_key: String,
    /// ⚠️ NEVER log this value
    pub application_secret: String,
    /// Empty when only requesting a new consumer key
    pub consumer_key: String,
}

impl fmt::Debug for RegistrarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrarConfig")
            .field("endpoint", &self.endpoint)
            .field("application_key", &mask(&self.application_key))
            .field("application_secret", &"<REDACTED>")
            .field("consumer_key", &mask(&self.consumer_key))
            .finish()
    }
}

impl RegistrarConfig {
    /// Full credentials for signed API calls
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        check_required(
            source,
            &[OVH_APPLICATION_KEY, OVH_APPLICATION_SECRET, OVH_CONSUMER_KEY],
        )?;
        Ok(Self {
            endpoint: source.get_or(OVH_API_ENDPOINT, DEFAULT_ENDPOINT),
            application_key: source.get_required(OVH_APPLICATION_KEY)?,
            application_secret: source.get_required(OVH_APPLICATION_SECRET)?,
            consumer_key: source.get_required(OVH_CONSUMER_KEY)?,
        })
    }

    /// Application credentials only, enough to request a consumer key
    pub fn application_only(source: &dyn ConfigSource) -> Result<Self> {
        check_required(source, &[OVH_APPLICATION_KEY, OVH_APPLICATION_SECRET])?;
        Ok(Self {
            endpoint: source.get_or(OVH_API_ENDPOINT, DEFAULT_ENDPOINT),
            application_key: source.get_required(OVH_APPLICATION_KEY)?,
            application_secret: source.get_required(OVH_APPLICATION_SECRET)?,
            consumer_key: String::new(),
        })
    }
}

/// Where the public IP comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpSourceConfig {
    /// Locally configured override (`IP_ADDRESS`)
    Static(Ipv4Addr),
    /// HTTP lookup endpoint (`IP_LOOKUP_URL`)
    Http { url: String },
}

impl IpSourceConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        if let Some(raw) = source.get(IP_ADDRESS).filter(|v| !v.trim().is_empty()) {
            let source = crate::traits::StaticIpSource::parse(&raw)?;
            return Ok(IpSourceConfig::Static(source.ip()));
        }

        let url = source.get_or(IP_LOOKUP_URL, DEFAULT_IP_LOOKUP_URL);
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(Error::config(format!(
                "{IP_LOOKUP_URL} must use HTTP or HTTPS scheme. Got: {url}"
            )));
        }
        Ok(IpSourceConfig::Http { url })
    }
}

/// Everything a reconciliation run needs
#[derive(Debug, Clone)]
pub struct DnsConfig {
    pub registrar: RegistrarConfig,
    pub zone: String,
    /// Primary subdomain first, then the additional ones, without duplicates
    pub sub_domains: Vec<String>,
    pub ip_source: IpSourceConfig,
    pub policy: ReconcilePolicy,
}

impl DnsConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        check_required(
            source,
            &[
                OVH_APPLICATION_KEY,
                OVH_APPLICATION_SECRET,
                OVH_CONSUMER_KEY,
                OVH_DNS_ZONE,
                OVH_DNS_SUBDOMAIN,
            ],
        )?;

        let registrar = RegistrarConfig::from_source(source)?;
        let zone = source.get_required(OVH_DNS_ZONE)?.trim().to_string();

        let mut sub_domains = vec![sub_domain_from(&source.get_required(OVH_DNS_SUBDOMAIN)?)];
        for extra in split_list(&source.get_or(DYNDNS_ADDITIONAL_SUBDOMAINS, "")) {
            let extra = sub_domain_from(&extra);
            if !sub_domains.contains(&extra) {
                sub_domains.push(extra);
            }
        }

        let mut policy = ReconcilePolicy::default();
        if let Some(target) = source
            .get(OVH_DISALLOWED_AAAA_TARGET)
            .filter(|v| !v.trim().is_empty())
        {
            policy.disallowed_aaaa_target = target.trim().to_string();
        }
        if let Some(ttl) = get_parsed::<u32>(source, OVH_RECORD_TTL)? {
            if ttl == 0 {
                return Err(Error::config(format!("{OVH_RECORD_TTL} must be > 0")));
            }
            policy.record_ttl = ttl;
        }

        Ok(Self {
            registrar,
            zone,
            sub_domains,
            ip_source: IpSourceConfig::from_source(source)?,
            policy,
        })
    }

    /// Desired state: every managed subdomain pointing at `ip`
    pub fn desired_state(&self, ip: Ipv4Addr) -> DesiredState {
        DesiredState::uniform(self.sub_domains.iter().cloned(), ip)
    }
}

/// Health polling and diagnostics settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    pub retry: RetryPolicy,
    pub urls: Vec<String>,
    pub diagnostic_ports: Vec<u16>,
}

impl HealthConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let defaults = RetryPolicy::default();
        let max_attempts =
            get_parsed::<u32>(source, HEALTH_MAX_RETRIES)?.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(Error::config(format!("{HEALTH_MAX_RETRIES} must be > 0")));
        }
        let delay = get_parsed::<u64>(source, HEALTH_DELAY_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.delay);

        let diagnostic_ports = split_list(&source.get_or(DIAGNOSTIC_PORTS, ""))
            .into_iter()
            .map(|port| {
                port.parse::<u16>().map_err(|e| {
                    Error::config(format!("{DIAGNOSTIC_PORTS} has an invalid port '{port}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            retry: RetryPolicy::new(max_attempts, delay),
            urls: split_list(&source.get_or(HEALTH_URLS, "")),
            diagnostic_ports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_source() -> MapSource {
        MapSource::new()
            .with(OVH_APPLICATION_KEY, "app-key-123")
            .with(OVH_APPLICATION_SECRET, "app-secret-456")
            .with(OVH_CONSUMER_KEY, "consumer-789")
            .with(OVH_DNS_ZONE, "iaproject.fr")
            .with(OVH_DNS_SUBDOMAIN, "airquality")
    }

    #[test]
    fn test_dotenv_parsing() {
        let contents = r#"
# registrar
OVH_DNS_ZONE = iaproject.fr
OVH_DNS_SUBDOMAIN='airquality'
OVH_APPLICATION_SECRET="a=b"
EMPTY=
"#;
        let source = DotenvSource::parse(contents).unwrap();

        assert_eq!(source.get(OVH_DNS_ZONE).as_deref(), Some("iaproject.fr"));
        assert_eq!(source.get(OVH_DNS_SUBDOMAIN).as_deref(), Some("airquality"));
        assert_eq!(source.get(OVH_APPLICATION_SECRET).as_deref(), Some("a=b"));
        assert_eq!(source.get("EMPTY").as_deref(), Some(""));
        assert_eq!(source.get("MISSING"), None);
    }

    #[test]
    fn test_dotenv_rejects_malformed_line() {
        let err = DotenvSource::parse("OVH_DNS_ZONE=x\nnot a pair\n").unwrap_err();
        assert!(err.contains("line 2"), "unexpected error: {err}");
    }

    #[test]
    fn test_dotenv_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"OVH_DNS_ZONE=example.fr\n").unwrap();

        let source = DotenvSource::load(file.path()).unwrap();
        assert_eq!(source.get(OVH_DNS_ZONE).as_deref(), Some("example.fr"));
    }

    #[test]
    fn test_dotenv_missing_file_is_config_error() {
        let err = DotenvSource::load("/nonexistent/.env").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_get_required_rejects_empty() {
        let source = MapSource::new().with(OVH_DNS_ZONE, "  ");
        let err = source.get_required(OVH_DNS_ZONE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: missing required configuration: OVH_DNS_ZONE"
        );
    }

    #[test]
    fn test_layered_source_prefers_first_layer() {
        let source = LayeredSource::new()
            .with_layer(MapSource::new().with(OVH_DNS_ZONE, "from-env"))
            .with_layer(
                MapSource::new()
                    .with(OVH_DNS_ZONE, "from-file")
                    .with(OVH_DNS_SUBDOMAIN, "www"),
            );

        assert_eq!(source.get(OVH_DNS_ZONE).as_deref(), Some("from-env"));
        assert_eq!(source.get(OVH_DNS_SUBDOMAIN).as_deref(), Some("www"));
    }

    #[test]
    fn test_dns_config_lists_every_missing_key() {
        let source = MapSource::new().with(OVH_APPLICATION_KEY, "k");
        let err = DnsConfig::from_source(&source).unwrap_err();
        let message = err.to_string();

        assert!(err.is_config());
        for key in [
            OVH_APPLICATION_SECRET,
            OVH_CONSUMER_KEY,
            OVH_DNS_ZONE,
            OVH_DNS_SUBDOMAIN,
        ] {
            assert!(message.contains(key), "{key} missing from: {message}");
        }
        assert!(!message.contains(OVH_APPLICATION_KEY));
    }

    #[test]
    fn test_dns_config_defaults() {
        let config = DnsConfig::from_source(&full_source()).unwrap();

        assert_eq!(config.zone, "iaproject.fr");
        assert_eq!(config.sub_domains, vec!["airquality".to_string()]);
        assert_eq!(config.registrar.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.policy, ReconcilePolicy::default());
        assert_eq!(
            config.ip_source,
            IpSourceConfig::Http {
                url: DEFAULT_IP_LOOKUP_URL.to_string()
            }
        );
    }

    #[test]
    fn test_dns_config_additional_subdomains_and_override() {
        let source = full_source()
            .with(DYNDNS_ADDITIONAL_SUBDOMAINS, " api, ,airquality,www ")
            .with(IP_ADDRESS, "91.173.110.4")
            .with(OVH_RECORD_TTL, "120");
        let config = DnsConfig::from_source(&source).unwrap();

        assert_eq!(config.sub_domains, vec!["airquality", "api", "www"]);
        assert_eq!(
            config.ip_source,
            IpSourceConfig::Static(Ipv4Addr::new(91, 173, 110, 4))
        );
        assert_eq!(config.policy.record_ttl, 120);

        let desired = config.desired_state(Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(desired.len(), 3);
    }

    #[test]
    fn test_apex_marker_selects_zone_apex() {
        let source = full_source()
            .with(OVH_DNS_SUBDOMAIN, "@")
            .with(DYNDNS_ADDITIONAL_SUBDOMAINS, "www, @");
        let config = DnsConfig::from_source(&source).unwrap();

        assert_eq!(config.sub_domains, vec!["", "www"]);
        let desired = config.desired_state(Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(desired.target(""), Some(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn test_dns_config_rejects_bad_ttl() {
        let err = DnsConfig::from_source(&full_source().with(OVH_RECORD_TTL, "soon")).unwrap_err();
        assert!(err.is_config());

        let err = DnsConfig::from_source(&full_source().with(OVH_RECORD_TTL, "0")).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_application_only_skips_consumer_key() {
        let source = MapSource::new()
            .with(OVH_APPLICATION_KEY, "k")
            .with(OVH_APPLICATION_SECRET, "s")
            .with(OVH_API_ENDPOINT, "ovh-ca");
        let registrar = RegistrarConfig::application_only(&source).unwrap();

        assert_eq!(registrar.endpoint, "ovh-ca");
        assert!(registrar.consumer_key.is_empty());
    }

    #[test]
    fn test_registrar_debug_masks_credentials() {
        let registrar = RegistrarConfig::from_source(&full_source()).unwrap();
        let debug = format!("{:?}", registrar);

        assert!(!debug.contains("app-secret-456"));
        assert!(!debug.contains("app-key-123"));
        assert!(!debug.contains("consumer-789"));
        assert!(debug.contains("app-k***"));
    }

    #[test]
    fn test_health_config() {
        let defaults = HealthConfig::from_source(&MapSource::new()).unwrap();
        assert_eq!(defaults.retry, RetryPolicy::default());
        assert!(defaults.urls.is_empty());

        let source = MapSource::new()
            .with(HEALTH_MAX_RETRIES, "5")
            .with(HEALTH_DELAY_SECS, "1")
            .with(HEALTH_URLS, "http://localhost:8092/health, http://localhost:8093/health")
            .with(DIAGNOSTIC_PORTS, "8092,8093");
        let config = HealthConfig::from_source(&source).unwrap();

        assert_eq!(config.retry, RetryPolicy::new(5, Duration::from_secs(1)));
        assert_eq!(config.urls.len(), 2);
        assert_eq!(config.diagnostic_ports, vec![8092, 8093]);

        let err = HealthConfig::from_source(&MapSource::new().with(HEALTH_MAX_RETRIES, "0"))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_sensitive_keys() {
        assert!(is_sensitive_key(OVH_APPLICATION_KEY));
        assert!(is_sensitive_key(OVH_APPLICATION_SECRET));
        assert!(is_sensitive_key(IP_ADDRESS));
        assert!(!is_sensitive_key(OVH_DNS_ZONE));
    }
}
