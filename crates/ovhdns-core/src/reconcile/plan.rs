//! Pure planning: current records + desired state → ordered operations
//!
//! Nothing here touches the network. The same inputs always yield the same
//! plan, which is what makes the second run after a successful apply empty.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::mask::mask;
use crate::types::{DesiredState, FieldType, Record, RecordId};

/// IPv6 address of the registrar's parking page
pub const DEFAULT_DISALLOWED_AAAA_TARGET: &str = "2001:41d0:301::23";

/// TTL given to every created or updated A record
pub const DEFAULT_RECORD_TTL: u32 = 60;

/// What the planner is allowed to change and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// The single AAAA target deleted from managed subdomains
    pub disallowed_aaaa_target: String,
    pub record_ttl: u32,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            disallowed_aaaa_target: DEFAULT_DISALLOWED_AAAA_TARGET.to_string(),
            record_ttl: DEFAULT_RECORD_TTL,
        }
    }
}

impl ReconcilePolicy {
    /// Exact match against the configured literal, compared as IPv6 when both parse
    pub fn is_disallowed_aaaa(&self, target: &str) -> bool {
        let target = target.trim();
        let literal = self.disallowed_aaaa_target.trim();
        match (target.parse::<Ipv6Addr>(), literal.parse::<Ipv6Addr>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => target.eq_ignore_ascii_case(literal),
        }
    }
}

/// Kind of a planned mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Delete,
    Update,
    Create,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Delete => "delete",
            OperationKind::Update => "update",
            OperationKind::Create => "create",
        })
    }
}

/// One planned mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Delete {
        record_id: RecordId,
        field_type: FieldType,
        sub_domain: String,
        target: String,
    },
    Update {
        record_id: RecordId,
        sub_domain: String,
        from: String,
        to: Ipv4Addr,
        ttl: u32,
    },
    Create {
        field_type: FieldType,
        sub_domain: String,
        target: Ipv4Addr,
        ttl: u32,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Create { .. } => OperationKind::Create,
        }
    }

    /// Existing record touched by the operation, `None` for a create
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Operation::Delete { record_id, .. } | Operation::Update { record_id, .. } => {
                Some(record_id)
            }
            Operation::Create { .. } => None,
        }
    }

    pub fn sub_domain(&self) -> &str {
        match self {
            Operation::Delete { sub_domain, .. }
            | Operation::Update { sub_domain, .. }
            | Operation::Create { sub_domain, .. } => sub_domain,
        }
    }
}

/// Targets are masked: this is what ends up in logs
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Delete {
                record_id,
                field_type,
                sub_domain,
                target,
            } => write!(
                f,
                "delete {} '{}' #{} ({})",
                field_type,
                sub_domain,
                record_id,
                mask(target)
            ),
            Operation::Update {
                record_id,
                sub_domain,
                from,
                to,
                ttl,
            } => write!(
                f,
                "update A '{}' #{} ({} -> {}, ttl {})",
                sub_domain,
                record_id,
                mask(from),
                mask(&to.to_string()),
                ttl
            ),
            Operation::Create {
                field_type,
                sub_domain,
                target,
                ttl,
            } => write!(
                f,
                "create {} '{}' ({}, ttl {})",
                field_type,
                sub_domain,
                mask(&target.to_string()),
                ttl
            ),
        }
    }
}

/// Classification of one inspected record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Disallowed AAAA target, will be deleted
    Delete,
    /// A record with a stale target, will be updated
    Update,
    /// Already in the desired state, or an AAAA record left alone
    Ok,
    /// A type the reconciler does not manage
    Unmanaged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordVerdict {
    pub record_id: RecordId,
    pub field_type: FieldType,
    pub sub_domain: String,
    pub target: String,
    pub verdict: Verdict,
}

/// Per-kind operation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub deletes: usize,
    pub updates: usize,
    pub creates: usize,
}

/// Ordered operations for one zone, computed fresh every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub zone: String,
    /// Deletes, then updates, then creates
    pub operations: Vec<Operation>,
    /// Every managed record that was inspected
    pub verdicts: Vec<RecordVerdict>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn counts(&self) -> PlanCounts {
        self.operations
            .iter()
            .fold(PlanCounts::default(), |mut counts, op| {
                match op.kind() {
                    OperationKind::Delete => counts.deletes += 1,
                    OperationKind::Update => counts.updates += 1,
                    OperationKind::Create => counts.creates += 1,
                }
                counts
            })
    }
}

fn a_target_matches(target: &str, desired: Ipv4Addr) -> bool {
    target
        .trim()
        .parse::<Ipv4Addr>()
        .is_ok_and(|current| current == desired)
}

/// Compute the plan that brings the managed A/AAAA records of `zone` to `desired`
///
/// # Errors
///
/// - [`Error::InvalidInput`] when `zone` is empty
/// - [`Error::PolicyViolation`] when a managed subdomain holds more than one
///   A record; no plan is produced in that case
pub fn plan(
    zone: &str,
    desired: &DesiredState,
    current: &[Record],
    policy: &ReconcilePolicy,
) -> Result<Plan> {
    if zone.trim().is_empty() {
        return Err(Error::invalid_input("zone name cannot be empty"));
    }

    let mut managed: BTreeMap<&str, Vec<&Record>> = desired
        .sub_domains()
        .map(|sub| (sub, Vec::new()))
        .collect();
    for record in current {
        if let Some(records) = managed.get_mut(record.sub_domain.as_str()) {
            records.push(record);
        }
    }
    for records in managed.values_mut() {
        records.sort_by(|a, b| a.id.cmp(&b.id));
    }

    for (sub_domain, records) in &managed {
        let a_records: Vec<String> = records
            .iter()
            .filter(|r| r.field_type == FieldType::A)
            .map(|r| r.id.to_string())
            .collect();
        if a_records.len() > 1 {
            return Err(Error::PolicyViolation {
                sub_domain: sub_domain.to_string(),
                record_ids: a_records,
            });
        }
    }

    let mut deletes = Vec::new();
    let mut updates = Vec::new();
    let mut creates = Vec::new();
    let mut verdicts = Vec::new();

    for (sub_domain, records) in &managed {
        let Some(desired_ip) = desired.target(sub_domain) else {
            continue;
        };
        let mut has_a_record = false;

        for record in records {
            let verdict = match record.field_type {
                FieldType::Aaaa if policy.is_disallowed_aaaa(&record.target) => {
                    deletes.push(Operation::Delete {
                        record_id: record.id.clone(),
                        field_type: record.field_type.clone(),
                        sub_domain: record.sub_domain.clone(),
                        target: record.target.clone(),
                    });
                    Verdict::Delete
                }
                FieldType::Aaaa => Verdict::Ok,
                FieldType::A => {
                    has_a_record = true;
                    if a_target_matches(&record.target, desired_ip) {
                        Verdict::Ok
                    } else {
                        updates.push(Operation::Update {
                            record_id: record.id.clone(),
                            sub_domain: record.sub_domain.clone(),
                            from: record.target.clone(),
                            to: desired_ip,
                            ttl: policy.record_ttl,
                        });
                        Verdict::Update
                    }
                }
                _ => Verdict::Unmanaged,
            };

            verdicts.push(RecordVerdict {
                record_id: record.id.clone(),
                field_type: record.field_type.clone(),
                sub_domain: record.sub_domain.clone(),
                target: record.target.clone(),
                verdict,
            });
        }

        if !has_a_record {
            creates.push(Operation::Create {
                field_type: FieldType::A,
                sub_domain: sub_domain.to_string(),
                target: desired_ip,
                ttl: policy.record_ttl,
            });
        }
    }

    let mut operations = deletes;
    operations.append(&mut updates);
    operations.append(&mut creates);

    Ok(Plan {
        zone: zone.to_string(),
        operations,
        verdicts,
    })
}
