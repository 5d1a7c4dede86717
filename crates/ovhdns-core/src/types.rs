//! Record model shared by the planner and the registrar collaborators
//!
//! Values follow the registrar's record schema verbatim (field type,
//! subdomain, target, ttl); no wire format is owned here.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Opaque record identifier within a zone
///
/// Registrars usually hand out numeric ids; those order numerically, so
/// `9` sorts before `10`. Non-numeric ids sort after them, as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    A,
    Aaaa,
    Cname,
    Mx,
    Ns,
    Txt,
    Srv,
    Caa,
    /// Any type the reconciler has no opinion about
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::A => "A",
            FieldType::Aaaa => "AAAA",
            FieldType::Cname => "CNAME",
            FieldType::Mx => "MX",
            FieldType::Ns => "NS",
            FieldType::Txt => "TXT",
            FieldType::Srv => "SRV",
            FieldType::Caa => "CAA",
            FieldType::Other(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::invalid_input("empty field type"));
        }
        Ok(match trimmed.to_ascii_uppercase().as_str() {
            "A" => FieldType::A,
            "AAAA" => FieldType::Aaaa,
            "CNAME" => FieldType::Cname,
            "MX" => FieldType::Mx,
            "NS" => FieldType::Ns,
            "TXT" => FieldType::Txt,
            "SRV" => FieldType::Srv,
            "CAA" => FieldType::Caa,
            other => FieldType::Other(other.to_string()),
        })
    }
}

impl TryFrom<String> for FieldType {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

/// A record as currently held by the registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub field_type: FieldType,
    /// Empty for the zone apex
    pub sub_domain: String,
    /// IP address or hostname
    pub target: String,
    pub ttl: u32,
}

impl Record {
    /// Fully qualified name of the record within `zone`
    pub fn fqdn(&self, zone: &str) -> String {
        fqdn(&self.sub_domain, zone)
    }
}

/// Payload for creating a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub field_type: FieldType,
    pub sub_domain: String,
    pub target: String,
    pub ttl: u32,
}

/// Join a subdomain and a zone, the apex being the zone itself
pub fn fqdn(sub_domain: &str, zone: &str) -> String {
    if sub_domain.is_empty() {
        zone.to_string()
    } else {
        format!("{sub_domain}.{zone}")
    }
}

/// Desired A-record target per managed subdomain
///
/// Read once per run and never mutated during it. Iteration order is the
/// subdomain order, which keeps generated plans deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    targets: BTreeMap<String, Ipv4Addr>,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subdomain in `sub_domains` pointing at the same address
    ///
    /// Duplicate subdomains collapse into one entry.
    pub fn uniform<I, S>(sub_domains: I, target: Ipv4Addr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = sub_domains
            .into_iter()
            .map(|sub| (sub.into(), target))
            .collect();
        Self { targets }
    }

    pub fn with_target(mut self, sub_domain: impl Into<String>, target: Ipv4Addr) -> Self {
        self.targets.insert(sub_domain.into(), target);
        self
    }

    pub fn target(&self, sub_domain: &str) -> Option<Ipv4Addr> {
        self.targets.get(sub_domain).copied()
    }

    pub fn contains(&self, sub_domain: &str) -> bool {
        self.targets.contains_key(sub_domain)
    }

    pub fn sub_domains(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Ipv4Addr)> {
        self.targets.iter().map(|(sub, ip)| (sub.as_str(), *ip))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_parsing() {
        assert_eq!("A".parse::<FieldType>().unwrap(), FieldType::A);
        assert_eq!("aaaa".parse::<FieldType>().unwrap(), FieldType::Aaaa);
        assert_eq!(
            "SPF".parse::<FieldType>().unwrap(),
            FieldType::Other("SPF".to_string())
        );
        assert!("".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_field_type_serde_as_string() {
        let json = serde_json::to_string(&FieldType::Aaaa).unwrap();
        assert_eq!(json, "\"AAAA\"");

        let parsed: FieldType = serde_json::from_str("\"CNAME\"").unwrap();
        assert_eq!(parsed, FieldType::Cname);
    }

    #[test]
    fn test_record_ids_order_numerically() {
        let mut ids: Vec<RecordId> = ["10", "9", "zz", "100"].into_iter().map(RecordId::from).collect();
        ids.sort();
        assert_eq!(
            ids.iter().map(RecordId::as_str).collect::<Vec<_>>(),
            vec!["9", "10", "100", "zz"]
        );
    }

    #[test]
    fn test_fqdn_apex() {
        assert_eq!(fqdn("", "example.fr"), "example.fr");
        assert_eq!(fqdn("www", "example.fr"), "www.example.fr");
    }

    #[test]
    fn test_desired_state_collapses_duplicates() {
        let ip = Ipv4Addr::new(91, 173, 110, 4);
        let desired = DesiredState::uniform(["www", "api", "www"], ip);

        assert_eq!(desired.len(), 2);
        assert_eq!(desired.sub_domains().collect::<Vec<_>>(), vec!["api", "www"]);
        assert_eq!(desired.target("www"), Some(ip));
        assert_eq!(desired.target("mail"), None);
    }
}
