// # ovhdns-core
//
// Core library for OVH DNS record reconciliation.
//
// ## Architecture Overview
//
// This library keeps the A records of a set of subdomains pointed at one
// public IPv4 address and checks that services behind them answer:
// - **RegistrarClient**: Trait for reading and mutating zone records
// - **IpSource**: Trait for discovering the public IP address
// - **plan**: Pure function computing the delete/update/create operations
// - **Reconciler**: Fetches, plans, applies, then refreshes the zone
// - **HealthPoller**: Fixed-interval polling of a health endpoint
//
// ## Design Principles
//
// 1. **Pure planning**: the plan is computed from a snapshot, no I/O
// 2. **Sequential**: one registrar call in flight at a time
// 3. **Fail fast**: configuration is validated before any network call,
//    the first failed mutation stops the plan
// 4. **Library-First**: the daemon is a thin shell around this crate

pub mod traits;
pub mod types;
pub mod config;
pub mod error;
pub mod mask;
pub mod health;
pub mod reconcile;
pub mod registrar;

// Re-export core types for convenience
pub use traits::{HealthProbe, IpSource, RegistrarClient, Sleeper, StaticIpSource, TokioSleeper};
pub use types::{DesiredState, FieldType, NewRecord, Record, RecordId};
pub use config::{ConfigSource, DnsConfig, HealthConfig, IpSourceConfig, RegistrarConfig};
pub use error::{Error, Result};
pub use health::{HealthPoller, HealthReport, RetryPolicy};
pub use reconcile::{
    ApplyReport, Operation, OperationKind, Plan, ReconcilePolicy, Reconciler, RunReport, Verdict,
    plan,
};
pub use registrar::MemoryRegistrar;
