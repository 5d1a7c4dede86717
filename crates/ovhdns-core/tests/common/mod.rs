//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call they receive so tests can assert on the
//! exact sequence the reconciler and the poller issue.

#![allow(dead_code)]

use ovhdns_core::error::{Error, Result};
use ovhdns_core::registrar::MemoryRegistrar;
use ovhdns_core::traits::{HealthProbe, RegistrarClient, Sleeper};
use ovhdns_core::types::{FieldType, NewRecord, Record, RecordId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ZONE: &str = "example.fr";

/// Build a record the way the registrar would return it
pub fn record(id: &str, field_type: FieldType, sub_domain: &str, target: &str) -> Record {
    Record {
        id: RecordId::from(id),
        field_type,
        sub_domain: sub_domain.to_string(),
        target: target.to_string(),
        ttl: 3600,
    }
}

/// A registrar call as observed by [`ScriptedRegistrar`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    Get(String),
    Create(String),
    Update(String, String),
    Delete(String),
    Refresh,
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::List(_) | Call::Get(_))
    }
}

/// Which call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    List,
    Get,
    Create,
    Update,
    Delete,
    Refresh,
}

/// Memory registrar that logs calls and fails on demand
#[derive(Clone)]
pub struct ScriptedRegistrar {
    inner: MemoryRegistrar,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_on: Arc<Mutex<Option<FailOn>>>,
}

impl ScriptedRegistrar {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            inner: MemoryRegistrar::seeded(ZONE, records),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_on: Arc::new(Mutex::new(None)),
        }
    }

    pub fn failing_on(self, fail_on: FailOn) -> Self {
        *self.fail_on.lock().unwrap() = Some(fail_on);
        self
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn memory(&self) -> &MemoryRegistrar {
        &self.inner
    }

    pub fn boxed(&self) -> Box<dyn RegistrarClient> {
        Box::new(self.clone())
    }

    fn observe(&self, call: Call, kind: FailOn) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(kind) {
            return Err(Error::provider("scripted", format!("injected {kind:?} failure")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistrarClient for ScriptedRegistrar {
    async fn list_records(&self, zone: &str, sub_domain: &str) -> Result<Vec<RecordId>> {
        self.observe(Call::List(sub_domain.to_string()), FailOn::List)?;
        self.inner.list_records(zone, sub_domain).await
    }

    async fn get_record(&self, zone: &str, record_id: &RecordId) -> Result<Record> {
        self.observe(Call::Get(record_id.to_string()), FailOn::Get)?;
        self.inner.get_record(zone, record_id).await
    }

    async fn create_record(&self, zone: &str, record: &NewRecord) -> Result<RecordId> {
        self.observe(Call::Create(record.sub_domain.clone()), FailOn::Create)?;
        self.inner.create_record(zone, record).await
    }

    async fn update_record(
        &self,
        zone: &str,
        record_id: &RecordId,
        sub_domain: &str,
        target: &str,
        ttl: u32,
    ) -> Result<()> {
        self.observe(
            Call::Update(record_id.to_string(), target.to_string()),
            FailOn::Update,
        )?;
        self.inner
            .update_record(zone, record_id, sub_domain, target, ttl)
            .await
    }

    async fn delete_record(&self, zone: &str, record_id: &RecordId) -> Result<()> {
        self.observe(Call::Delete(record_id.to_string()), FailOn::Delete)?;
        self.inner.delete_record(zone, record_id).await
    }

    async fn refresh_zone(&self, zone: &str) -> Result<()> {
        self.observe(Call::Refresh, FailOn::Refresh)?;
        self.inner.refresh_zone(zone).await
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Scripted answer of one probe
#[derive(Debug, Clone, Copy)]
pub enum ProbeOutcome {
    Status(u16),
    Unreachable,
}

/// Probe replaying a script; the last entry repeats once the script runs out
pub struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeOutcome>>,
    last: ProbeOutcome,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<ProbeOutcome>) -> Self {
        let last = script.last().copied().unwrap_or(ProbeOutcome::Unreachable);
        Self {
            script: Mutex::new(script.into()),
            last,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always(outcome: ProbeOutcome) -> Self {
        Self::new(vec![outcome])
    }

    /// Shared counter of probes issued
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, url: &str) -> Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(self.last);
        match outcome {
            ProbeOutcome::Status(status) => Ok(status),
            ProbeOutcome::Unreachable => Err(Error::http(format!("connection refused: {url}"))),
        }
    }
}

/// Sleeper that only records the requested durations
#[derive(Clone, Default)]
pub struct CountingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl CountingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
