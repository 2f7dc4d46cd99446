//! Decision audit records.
//!
//! When a check step has `audit: true`, every decision it reaches produces an
//! [`AuditRecord`]. The record goes to the plugin's [`AuditSink`] and is also
//! returned in the step output under `audit_event`.
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const AUDIT_EVENT_TYPE: &str = "authz_decision";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub subject: String,
    pub object: String,
    pub action: String,
    pub allowed: bool,
    pub module: String,
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn decision(
        module: &str,
        subject: &str,
        object: &str,
        action: &str,
        allowed: bool,
    ) -> Self {
        Self {
            kind: AUDIT_EVENT_TYPE,
            subject: subject.to_string(),
            object: object.to_string(),
            action: action.to_string(),
            allowed,
            module: module.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// The record as the JSON object placed under `audit_event`.
    pub fn to_value(&self) -> Value {
        let mut event = Map::new();
        event.insert("type".into(), Value::from(self.kind));
        event.insert("subject".into(), Value::from(self.subject.as_str()));
        event.insert("object".into(), Value::from(self.object.as_str()));
        event.insert("action".into(), Value::from(self.action.as_str()));
        event.insert("allowed".into(), Value::Bool(self.allowed));
        event.insert("module".into(), Value::from(self.module.as_str()));
        event.insert("timestamp".into(), Value::String(self.timestamp_rfc3339()));
        Value::Object(event)
    }

    /// UTC timestamp in RFC 3339 with whole seconds and a `Z` suffix.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

fn rfc3339<S: serde::Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Emits each record as an `info` event on the `authz::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        tracing::info!(
            target: "authz::audit",
            event = record.kind,
            subject = %record.subject,
            object = %record.object,
            action = %record.action,
            allowed = record.allowed,
            module = %record.module,
            timestamp = %record.timestamp_rfc3339(),
            "authz decision"
        );
    }
}

/// Keeps records in memory. Useful for hosts that forward audit records in
/// batches, and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn drain(&self) -> Vec<AuditRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().push(record.clone());
    }
}
