use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Guard,
    Discovery,
    Synthesis,
    Commit,
    Run,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Skipped,
    Failed,
}

/// Correlates every event emitted during one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub run_id: String,
    pub platform: String,
}

impl AuditContext {
    pub fn new(run_id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self { run_id: run_id.into(), platform: platform.into() }
    }

    pub fn fresh(platform: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), platform)
    }

    pub fn event(
        &self,
        action: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> AuditEvent {
        AuditEvent::new(self.run_id.clone(), action, category, outcome, self.platform.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub run_id: String,
    pub action: String,
    pub category: AuditCategory,
    pub outcome: AuditOutcome,
    pub platform: String,
    pub details: BTreeMap<String, Value>,
    pub performed_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        run_id: impl Into<String>,
        action: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            action: action.into(),
            category,
            outcome,
            platform: platform.into(),
            details: BTreeMap::new(),
            performed_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

/// Append-only destination for audit events.
///
/// `record` never fails from the caller's point of view: sinks log their own
/// delivery problems and swallow them.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.action).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.events().iter().filter(|event| event.action == action).count()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Used when no remote sink is configured: events only reach the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogOnlyAuditSink;

#[async_trait]
impl AuditSink for LogOnlyAuditSink {
    async fn record(&self, event: AuditEvent) {
        info!(
            event_name = "safepost.audit.local_only",
            run_id = %event.run_id,
            action = %event.action,
            outcome = ?event.outcome,
            "audit sink not configured, event kept in log only"
        );
    }
}
