//! Contract Test: Configuration Fail-Fast
//!
//! Missing required keys must surface as a configuration error before any
//! collaborator is built, so no network call can happen.

use ovhdns_core::config::{
    ConfigSource, DotenvSource, LayeredSource, MapSource, OVH_APPLICATION_KEY,
    OVH_APPLICATION_SECRET, OVH_CONSUMER_KEY, OVH_DNS_SUBDOMAIN, OVH_DNS_ZONE,
};
use ovhdns_core::{DnsConfig, HealthConfig, IpSourceConfig};
use std::io::Write;
use std::net::Ipv4Addr;

fn credentials() -> MapSource {
    MapSource::new()
        .with(OVH_APPLICATION_KEY, "app-key-123")
        .with(OVH_APPLICATION_SECRET, "app-secret-456")
        .with(OVH_CONSUMER_KEY, "consumer-789")
}

#[test]
fn every_missing_key_is_named() {
    let err = DnsConfig::from_source(&MapSource::new().with(OVH_DNS_ZONE, "example.fr"))
        .unwrap_err();

    assert!(err.is_config());
    let message = err.to_string();
    for key in [
        OVH_APPLICATION_KEY,
        OVH_APPLICATION_SECRET,
        OVH_CONSUMER_KEY,
        OVH_DNS_SUBDOMAIN,
    ] {
        assert!(message.contains(key), "{key} missing from: {message}");
    }
    assert!(!message.contains(OVH_DNS_ZONE));
}

#[test]
fn blank_values_count_as_missing() {
    let source = credentials()
        .with(OVH_DNS_ZONE, "example.fr")
        .with(OVH_DNS_SUBDOMAIN, "   ");

    let err = DnsConfig::from_source(&source).unwrap_err();
    assert!(err.to_string().contains(OVH_DNS_SUBDOMAIN));
}

#[test]
fn full_configuration_builds_desired_state() {
    let source = credentials()
        .with(OVH_DNS_ZONE, "example.fr")
        .with(OVH_DNS_SUBDOMAIN, "www")
        .with("DYNDNS_ADDITIONAL_SUBDOMAINS", "api, www ,mail")
        .with("IP_ADDRESS", "91.173.110.4");

    let config = DnsConfig::from_source(&source).unwrap();

    assert_eq!(config.sub_domains, vec!["www", "api", "mail"]);
    assert_eq!(
        config.ip_source,
        IpSourceConfig::Static(Ipv4Addr::new(91, 173, 110, 4))
    );
    let desired = config.desired_state(Ipv4Addr::new(91, 173, 110, 4));
    assert_eq!(desired.len(), 3);
}

#[test]
fn health_settings_do_not_need_credentials() {
    let config = HealthConfig::from_source(&MapSource::new()).unwrap();
    assert_eq!(config.retry.max_attempts, 30);
    assert!(config.urls.is_empty());
}

#[test]
fn process_values_override_dotenv_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# credentials").unwrap();
    writeln!(file, "OVH_DNS_ZONE=from-file.fr").unwrap();
    writeln!(file, "OVH_DNS_SUBDOMAIN=\"www\"").unwrap();

    let layered = LayeredSource::new()
        .with_layer(MapSource::new().with(OVH_DNS_ZONE, "from-env.fr"))
        .with_layer(DotenvSource::load(file.path()).unwrap());

    assert_eq!(layered.get(OVH_DNS_ZONE).as_deref(), Some("from-env.fr"));
    assert_eq!(layered.get(OVH_DNS_SUBDOMAIN).as_deref(), Some("www"));
}
