// # Memory Registrar
//
// In-memory implementation of RegistrarClient.
//
// ## Purpose
//
// Holds zones as plain maps so the reconciler can be driven end to end
// without a network. Ids are allocated sequentially, mimicking the numeric
// ids a real registrar hands out.
//
// ## Refresh
//
// Mutations are visible immediately; `refresh_zone` only counts calls so
// callers can assert it happened exactly once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::RegistrarClient;
use crate::types::{NewRecord, Record, RecordId};

/// First id handed out when a zone is seeded without numeric ids
const FIRST_ALLOCATED_ID: u64 = 1000;

#[derive(Debug, Default)]
struct Zones {
    records: HashMap<String, BTreeMap<RecordId, Record>>,
    refreshes: HashMap<String, usize>,
    next_id: u64,
}

impl Zones {
    fn zone(&self, zone: &str) -> Result<&BTreeMap<RecordId, Record>, Error> {
        self.records
            .get(zone)
            .ok_or_else(|| Error::not_found(format!("zone {zone}")))
    }

    fn zone_mut(&mut self, zone: &str) -> Result<&mut BTreeMap<RecordId, Record>, Error> {
        self.records
            .get_mut(zone)
            .ok_or_else(|| Error::not_found(format!("zone {zone}")))
    }

    fn allocate_id(&mut self) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        RecordId::from(id)
    }
}

/// In-memory registrar
///
/// Clones share the same zones, so a test can keep a handle for
/// inspection after boxing another one into a `Reconciler`.
///
/// # Example
///
/// ```rust,no_run
/// use ovhdns_core::registrar::MemoryRegistrar;
/// use ovhdns_core::traits::RegistrarClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registrar = MemoryRegistrar::new();
///     registrar.add_zone("example.fr").await;
///
///     let ids = registrar.list_records("example.fr", "www").await?;
///     assert!(ids.is_empty());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRegistrar {
    inner: Arc<RwLock<Zones>>,
}

impl MemoryRegistrar {
    /// Create a registrar holding no zone
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Zones {
                next_id: FIRST_ALLOCATED_ID,
                ..Zones::default()
            })),
        }
    }

    /// Create a registrar holding `zone` with the given records
    pub fn seeded(zone: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        let records: BTreeMap<RecordId, Record> = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let highest = records
            .keys()
            .filter_map(|id| id.as_str().parse::<u64>().ok())
            .max();
        let next_id = highest.map_or(FIRST_ALLOCATED_ID, |id| id.max(FIRST_ALLOCATED_ID - 1) + 1);

        let mut zones = HashMap::new();
        zones.insert(zone.into(), records);

        Self {
            inner: Arc::new(RwLock::new(Zones {
                records: zones,
                refreshes: HashMap::new(),
                next_id,
            })),
        }
    }

    /// Add an empty zone, keeping the records of an existing one
    pub async fn add_zone(&self, zone: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.records.entry(zone.into()).or_default();
    }

    /// Snapshot of every record of `zone`, ordered by id
    pub async fn records(&self, zone: &str) -> Vec<Record> {
        let guard = self.inner.read().await;
        guard
            .records
            .get(zone)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of times `zone` was refreshed
    pub async fn refresh_count(&self, zone: &str) -> usize {
        let guard = self.inner.read().await;
        guard.refreshes.get(zone).copied().unwrap_or(0)
    }
}

impl Default for MemoryRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistrarClient for MemoryRegistrar {
    async fn list_records(&self, zone: &str, sub_domain: &str) -> Result<Vec<RecordId>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .zone(zone)?
            .values()
            .filter(|record| record.sub_domain == sub_domain)
            .map(|record| record.id.clone())
            .collect())
    }

    async fn get_record(&self, zone: &str, record_id: &RecordId) -> Result<Record, Error> {
        let guard = self.inner.read().await;
        guard
            .zone(zone)?
            .get(record_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("record #{record_id} in {zone}")))
    }

    async fn create_record(&self, zone: &str, record: &NewRecord) -> Result<RecordId, Error> {
        let mut guard = self.inner.write().await;
        guard.zone(zone)?;

        let id = guard.allocate_id();
        guard.zone_mut(zone)?.insert(
            id.clone(),
            Record {
                id: id.clone(),
                field_type: record.field_type.clone(),
                sub_domain: record.sub_domain.clone(),
                target: record.target.clone(),
                ttl: record.ttl,
            },
        );
        Ok(id)
    }

    async fn update_record(
        &self,
        zone: &str,
        record_id: &RecordId,
        sub_domain: &str,
        target: &str,
        ttl: u32,
    ) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let record = guard
            .zone_mut(zone)?
            .get_mut(record_id)
            .ok_or_else(|| Error::not_found(format!("record #{record_id} in {zone}")))?;

        record.sub_domain = sub_domain.to_string();
        record.target = target.to_string();
        record.ttl = ttl;
        Ok(())
    }

    async fn delete_record(&self, zone: &str, record_id: &RecordId) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .zone_mut(zone)?
            .remove(record_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("record #{record_id} in {zone}")))
    }

    async fn refresh_zone(&self, zone: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.zone(zone)?;
        *guard.refreshes.entry(zone.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
