//! Contract Test: Idempotency
//!
//! Running the reconciler twice in a row against unchanged external state
//! must leave nothing to do the second time.

mod common;

use common::*;
use ovhdns_core::reconcile::{ReconcilePolicy, Reconciler};
use ovhdns_core::types::{DesiredState, FieldType};
use std::net::Ipv4Addr;

#[tokio::test]
async fn second_run_produces_empty_plan() {
    let registrar = ScriptedRegistrar::new(vec![
        record("10", FieldType::Aaaa, "www", "2001:41d0:301::23"),
        record("11", FieldType::A, "www", "10.0.0.1"),
        record("12", FieldType::Aaaa, "api", "2001:db8::1"),
    ]);
    let reconciler = Reconciler::new(registrar.boxed(), ReconcilePolicy::default());
    let desired = DesiredState::uniform(["www", "api", "mail"], Ipv4Addr::new(91, 173, 110, 4));

    let first = reconciler.run(ZONE, &desired).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.plan.len(), 4);

    registrar.reset_calls();
    let second = reconciler.run(ZONE, &desired).await.unwrap();

    assert!(second.plan.is_empty(), "second plan: {:?}", second.plan.operations);
    assert!(registrar.mutations().is_empty());
    assert_eq!(registrar.memory().refresh_count(ZONE).await, 1);
}

#[tokio::test]
async fn recovers_after_failed_run() {
    let registrar = ScriptedRegistrar::new(vec![
        record("10", FieldType::Aaaa, "www", "2001:41d0:301::23"),
        record("11", FieldType::A, "www", "10.0.0.1"),
    ])
    .failing_on(FailOn::Update);
    let reconciler = Reconciler::new(registrar.boxed(), ReconcilePolicy::default());
    let desired = DesiredState::uniform(["www"], Ipv4Addr::new(91, 173, 110, 4));

    let first = reconciler.run(ZONE, &desired).await.unwrap();
    assert!(!first.is_success());

    // Only the update is left once the delete went through
    registrar.clear_failure();
    let second = reconciler.run(ZONE, &desired).await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.plan.len(), 1);

    let third = reconciler.run(ZONE, &desired).await.unwrap();
    assert!(third.plan.is_empty());
}
