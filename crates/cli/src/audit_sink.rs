use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use safepost_core::config::AuditConfig;
use safepost_core::{AuditEvent, AuditSink};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

const AUDIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Appends audit rows to a Supabase table through its REST interface.
/// Delivery failures are logged and dropped.
pub struct SupabaseAuditSink {
    http: reqwest::Client,
    endpoint: String,
    service_key: SecretString,
}

#[derive(Serialize)]
struct AuditRow<'a> {
    platform: &'a str,
    action: &'a str,
    details: Value,
    performed_at: String,
}

impl SupabaseAuditSink {
    pub fn new(base_url: &str, table: &str, service_key: SecretString) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(AUDIT_TIMEOUT)
            .build()
            .context("failed to build audit HTTP client")?;
        let endpoint = format!("{}/rest/v1/{table}", base_url.trim_end_matches('/'));
        Ok(Self { http, endpoint, service_key })
    }

    /// `None` when the sink is not configured.
    pub fn from_config(config: &AuditConfig) -> Result<Option<Self>> {
        match (&config.supabase_url, &config.service_key) {
            (Some(url), Some(key)) if config.is_configured() => {
                Self::new(url, &config.table, key.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn row(event: &AuditEvent) -> AuditRow<'_> {
        let mut details: Map<String, Value> =
            event.details.iter().map(|(key, value)| (key.clone(), value.clone())).collect();
        details.insert("event_id".to_string(), Value::from(event.event_id.as_str()));
        details.insert("run_id".to_string(), Value::from(event.run_id.as_str()));
        details.insert(
            "category".to_string(),
            serde_json::to_value(event.category).unwrap_or(Value::Null),
        );
        details.insert(
            "outcome".to_string(),
            serde_json::to_value(event.outcome).unwrap_or(Value::Null),
        );

        AuditRow {
            platform: &event.platform,
            action: &event.action,
            details: Value::Object(details),
            performed_at: event.performed_at.to_rfc3339(),
        }
    }
}

#[async_trait]
impl AuditSink for SupabaseAuditSink {
    async fn record(&self, event: AuditEvent) {
        let key = self.service_key.expose_secret();
        let result = self
            .http
            .post(&self.endpoint)
            .header("apikey", key)
            .bearer_auth(key)
            .header("Prefer", "return=minimal")
            .json(&Self::row(&event))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!(
                event_name = "safepost.audit.rejected",
                action = %event.action,
                status = response.status().as_u16(),
                "audit sink rejected event"
            ),
            Err(error) => warn!(
                event_name = "safepost.audit.unreachable",
                action = %event.action,
                error = %error,
                "audit sink unreachable, event dropped"
            ),
        }
    }
}
