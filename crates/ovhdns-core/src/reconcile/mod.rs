//! DNS record reconciliation
//!
//! The Reconciler is responsible for:
//! - Fetching the current records of every managed subdomain
//! - Computing the plan (see [`plan`])
//! - Applying the plan, stopping at the first failure
//! - Refreshing the zone once every operation succeeded
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   list/get    ┌─────────────────┐
//! │  Reconciler  │──────────────►│ RegistrarClient │
//! └──────────────┘               └─────────────────┘
//!        │                                ▲
//!        │ plan() (pure)                  │ delete → update → create
//!        ▼                                │ then refresh
//! ┌──────────────┐      apply()           │
//! │     Plan     │────────────────────────┘
//! └──────────────┘
//! ```
//!
//! Every registrar call is awaited before the next one is issued. There is
//! no retry here: a failed read aborts the run before planning, a failed
//! mutation aborts the rest of the plan and nothing is rolled back.

pub mod plan;

pub use plan::{
    DEFAULT_DISALLOWED_AAAA_TARGET, DEFAULT_RECORD_TTL, Operation, OperationKind, Plan,
    PlanCounts, ReconcilePolicy, RecordVerdict, Verdict, plan,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mask::mask;
use crate::traits::RegistrarClient;
use crate::types::{DesiredState, NewRecord, Record, RecordId, fqdn};

/// An operation that the registrar accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedOperation {
    pub operation: Operation,
    /// The touched record, or the id assigned to a created one
    pub record_id: RecordId,
}

/// The step a plan stopped at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum FailedStep {
    Operation { operation: Operation },
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub step: FailedStep,
    pub error: String,
}

/// What happened while applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Operations that succeeded, in order
    pub applied: Vec<AppliedOperation>,
    /// First failure, after which nothing else was attempted
    pub failure: Option<ApplyFailure>,
    /// Operations never attempted because of the failure
    pub skipped: Vec<Operation>,
    /// Whether the zone refresh was issued and succeeded
    pub refreshed: bool,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Result of a full reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub zone: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub plan: Plan,
    pub apply: ApplyReport,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.apply.is_success()
    }
}

/// Brings the managed records of a zone to the desired state
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run()`] once per reconciliation
///
/// At most one run at a time is expected; scheduling is the caller's job.
pub struct Reconciler {
    /// Registrar API client
    client: Box<dyn RegistrarClient>,

    /// Disallowed AAAA literal and record TTL
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(client: Box<dyn RegistrarClient>, policy: ReconcilePolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    pub fn client(&self) -> &dyn RegistrarClient {
        self.client.as_ref()
    }

    /// Fetch every record of the given subdomains
    ///
    /// # Errors
    ///
    /// Any list/get failure is returned as [`Error::Transient`]; no partial
    /// result is returned.
    pub async fn fetch_current(&self, zone: &str, sub_domains: &[String]) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        for sub_domain in sub_domains {
            let name = fqdn(sub_domain, zone);
            let ids = self
                .client
                .list_records(zone, sub_domain)
                .await
                .map_err(|e| Error::transient(format!("listing records of {name}: {e}")))?;
            debug!("{} record(s) found for {}", ids.len(), name);

            for id in ids {
                let record = self
                    .client
                    .get_record(zone, &id)
                    .await
                    .map_err(|e| Error::transient(format!("fetching record #{id} of {name}: {e}")))?;
                debug!(
                    "Record #{} {} '{}' -> {} (ttl {})",
                    record.id,
                    record.field_type,
                    record.sub_domain,
                    mask(&record.target),
                    record.ttl
                );
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Fetch the current records and compute the plan
    pub async fn plan_for(&self, zone: &str, desired: &DesiredState) -> Result<Plan> {
        let sub_domains: Vec<String> = desired.sub_domains().map(str::to_string).collect();
        let current = self.fetch_current(zone, &sub_domains).await?;
        let plan = plan(zone, desired, &current, &self.policy)?;

        let counts = plan.counts();
        info!(
            "Plan for {}: {} delete(s), {} update(s), {} create(s)",
            zone, counts.deletes, counts.updates, counts.creates
        );
        Ok(plan)
    }

    /// Execute a plan against the registrar
    ///
    /// Stops at the first failing operation and reports the rest as
    /// skipped. The zone is refreshed once, only when the plan was
    /// non-empty and every operation succeeded.
    pub async fn apply(&self, plan: &Plan) -> ApplyReport {
        let mut report = ApplyReport::default();
        let zone = plan.zone.as_str();

        if plan.is_empty() {
            info!("Zone {} already up to date, nothing to apply", zone);
            return report;
        }

        let mut pending = plan.operations.iter();
        while let Some(operation) = pending.next() {
            info!("Applying {}", operation);
            match self.execute(zone, operation).await {
                Ok(record_id) => {
                    report.applied.push(AppliedOperation {
                        operation: operation.clone(),
                        record_id,
                    });
                }
                Err(e) => {
                    error!("Failed to {}: {}", operation, e);
                    report.skipped = pending.cloned().collect();
                    if !report.skipped.is_empty() {
                        warn!(
                            "Stopping after failure, {} operation(s) not attempted",
                            report.skipped.len()
                        );
                    }
                    report.failure = Some(ApplyFailure {
                        step: FailedStep::Operation {
                            operation: operation.clone(),
                        },
                        error: e.to_string(),
                    });
                    return report;
                }
            }
        }

        info!("Refreshing zone {}", zone);
        match self.client.refresh_zone(zone).await {
            Ok(()) => {
                info!("Zone {} refreshed", zone);
                report.refreshed = true;
            }
            Err(e) => {
                let e = Error::mutation("refresh", zone, e.to_string());
                error!("{}", e);
                report.failure = Some(ApplyFailure {
                    step: FailedStep::Refresh,
                    error: e.to_string(),
                });
            }
        }

        report
    }

    /// Plan and apply in one go
    ///
    /// # Errors
    ///
    /// Read failures and policy violations abort before anything is
    /// mutated. Mutation failures are not errors here: they are recorded
    /// in the returned report.
    pub async fn run(&self, zone: &str, desired: &DesiredState) -> Result<RunReport> {
        let started_at = Utc::now();
        info!(
            "Reconciling {} managed subdomain(s) of {} via {}",
            desired.len(),
            zone,
            self.client.provider_name()
        );

        let plan = self.plan_for(zone, desired).await?;
        let apply = self.apply(&plan).await;

        if apply.is_success() {
            info!(
                "Reconciliation of {} succeeded ({} operation(s) applied)",
                zone,
                apply.applied.len()
            );
        } else {
            error!(
                "Reconciliation of {} failed after {} operation(s)",
                zone,
                apply.applied.len()
            );
        }

        Ok(RunReport {
            zone: zone.to_string(),
            started_at,
            finished_at: Utc::now(),
            plan,
            apply,
        })
    }

    /// Issue the registrar call for one operation
    async fn execute(&self, zone: &str, operation: &Operation) -> Result<RecordId> {
        let kind = operation.kind().to_string();
        let result = match operation {
            Operation::Delete { record_id, .. } => self
                .client
                .delete_record(zone, record_id)
                .await
                .map(|()| record_id.clone()),
            Operation::Update {
                record_id,
                sub_domain,
                to,
                ttl,
                ..
            } => self
                .client
                .update_record(zone, record_id, sub_domain, &to.to_string(), *ttl)
                .await
                .map(|()| record_id.clone()),
            Operation::Create {
                field_type,
                sub_domain,
                target,
                ttl,
            } => {
                let record = NewRecord {
                    field_type: field_type.clone(),
                    sub_domain: sub_domain.clone(),
                    target: target.to_string(),
                    ttl: *ttl,
                };
                self.client.create_record(zone, &record).await
            }
        };

        result.map_err(|e| {
            let target = operation
                .record_id()
                .map(|id| format!("#{id}"))
                .unwrap_or_else(|| fqdn(operation.sub_domain(), zone));
            Error::mutation(kind, target, e.to_string())
        })
    }
}
