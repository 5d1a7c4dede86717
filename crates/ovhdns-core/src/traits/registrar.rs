// # Registrar Client Trait
//
// Defines the narrow interface the reconciler uses to read and mutate the
// records of a zone held by the registrar.
//
// ## Implementations
//
// - OVH: `ovhdns-provider-ovh` crate
// - In-memory: `ovhdns_core::registrar::MemoryRegistrar` (tests, dry runs)
//
// ## Usage
//
// ```rust,ignore
// use ovhdns_core::RegistrarClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* RegistrarClient implementation */;
//
//     for id in client.list_records("example.fr", "www").await? {
//         let record = client.get_record("example.fr", &id).await?;
//         println!("{} {} {}", record.field_type, record.sub_domain, record.target);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::types::{NewRecord, Record, RecordId};

/// Trait for registrar API clients
///
/// Authentication and request signing are entirely the implementation's
/// concern; the reconciler only sees records.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to the registrar endpoint only
/// - ✅ Parse registrar-specific responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed call aborts the run, see `Reconciler`)
/// - ❌ Decide whether a record needs changing (owned by the planner)
/// - ❌ Refresh the zone implicitly after a mutation (owned by `Reconciler`)
/// - ❌ Spawn tasks or issue calls concurrently
///
/// Every method is single-shot: one logical registrar call per invocation.
#[async_trait]
pub trait RegistrarClient: Send + Sync {
    /// List the ids of every record of `zone` whose subdomain is `sub_domain`
    ///
    /// An empty `sub_domain` selects the zone apex.
    async fn list_records(
        &self,
        zone: &str,
        sub_domain: &str,
    ) -> Result<Vec<RecordId>, crate::Error>;

    /// Fetch one record by id
    async fn get_record(&self, zone: &str, record_id: &RecordId) -> Result<Record, crate::Error>;

    /// Create a record, returning the id assigned by the registrar
    async fn create_record(
        &self,
        zone: &str,
        record: &NewRecord,
    ) -> Result<RecordId, crate::Error>;

    /// Point an existing record at a new target
    async fn update_record(
        &self,
        zone: &str,
        record_id: &RecordId,
        sub_domain: &str,
        target: &str,
        ttl: u32,
    ) -> Result<(), crate::Error>;

    /// Delete a record
    async fn delete_record(&self, zone: &str, record_id: &RecordId) -> Result<(), crate::Error>;

    /// Push pending zone edits live to the authoritative nameservers
    async fn refresh_zone(&self, zone: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
