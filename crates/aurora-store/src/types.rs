// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Entity types for the incident data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Investigating,
    Analyzed,
    Resolved,
    Merged,
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Analyzed => "analyzed",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Merged => "merged",
        };
        write!(f, "{s}")
    }
}

/// Status of the agentic RCA run attached to an incident, independent of the
/// incident's own lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuroraStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        };
        write!(f, "{s}")
    }
}

/// An immutable, append-only record of a raw webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAlertEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub source_type: String,
    /// External id from the source, used for idempotent ingestion together
    /// with `source_type` and `tenant_id`.
    pub dedup_key: String,
    pub title: String,
    pub status_raw: String,
    pub severity_raw: Option<String>,
    pub service: Option<String>,
    pub incident_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRawEvent {
    pub source_type: String,
    pub dedup_key: String,
    pub title: String,
    pub status_raw: String,
    pub severity_raw: Option<String>,
    pub service: Option<String>,
    pub incident_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub source_type: String,
    pub source_alert_id: String,
    pub status: IncidentStatus,
    pub aurora_status: AuroraStatus,
    pub severity: Severity,
    pub alert_title: String,
    pub alert_service: Option<String>,
    pub affected_services: Vec<String>,
    pub correlated_alert_count: u32,
    pub aurora_summary: Option<String>,
    pub aurora_chat_session_id: Option<Uuid>,
    pub alert_metadata: serde_json::Value,
    pub merged_into_incident_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Fetch a runbook link from `alert_metadata.customFields.runbook_link`
    /// if one has been recorded. Populated by a source-specific
    /// custom-field-update event that may arrive after the triggering alert.
    pub fn runbook_link(&self) -> Option<&str> {
        self.alert_metadata
            .get("customFields")
            .and_then(|v| v.get("runbook_link"))
            .and_then(|v| v.as_str())
    }
}

/// Fields accepted by `Store::upsert_incident`. On conflict with an
/// existing `(source_type, source_alert_id, tenant_id)` row, only the
/// fields here are refreshed — `id`, `started_at`, and
/// `merged_into_incident_id` are left untouched by the upsert itself.
#[derive(Debug, Clone)]
pub struct IncidentUpsert {
    pub source_type: String,
    pub source_alert_id: String,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub alert_title: String,
    pub alert_service: Option<String>,
    /// Merged into the existing row's `alert_metadata` (object union),
    /// preserving keys not present in this update.
    pub alert_metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrategy {
    Primary,
    Identity,
    ServiceFingerprint,
    ServiceTimeWindow,
    Manual,
}

impl std::fmt::Display for CorrelationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CorrelationStrategy::Primary => "primary",
            CorrelationStrategy::Identity => "identity",
            CorrelationStrategy::ServiceFingerprint => "service_fingerprint",
            CorrelationStrategy::ServiceTimeWindow => "service_time_window",
            CorrelationStrategy::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentAlert {
    pub incident_id: Uuid,
    pub raw_event_id: Uuid,
    pub correlation_strategy: CorrelationStrategy,
    pub correlation_score: f32,
    pub correlation_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIncidentAlert {
    pub incident_id: Uuid,
    pub raw_event_id: Uuid,
    pub correlation_strategy: CorrelationStrategy,
    pub correlation_score: f32,
    pub correlation_details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentThought {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub thought_type: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIncidentThought {
    pub incident_id: Uuid,
    pub thought_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentCitation {
    pub incident_id: Uuid,
    pub citation_key: String,
    pub tool_name: String,
    pub command: Option<String>,
    pub output: String,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewIncidentCitation {
    pub incident_id: Uuid,
    pub citation_key: String,
    pub tool_name: String,
    pub command: Option<String>,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    Diagnostic,
    Mitigation,
    Communication,
    Fix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionRisk {
    Safe,
    Moderate,
    Destructive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIncidentSuggestion {
    pub incident_id: Uuid,
    pub suggestion_type: SuggestionType,
    pub risk: SuggestionRisk,
    pub description: String,
    pub command: Option<String>,
    pub patch: Option<SuggestionPatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionPatch {
    pub path: String,
    pub original: String,
    pub suggested: String,
    pub repo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSessionStatus {
    Active,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerMetadata {
    pub source: String,
    pub incident_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub status: ChatSessionStatus,
    pub incident_id: Option<Uuid>,
    pub trigger_metadata: Option<TriggerMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatSession {
    pub title: String,
    pub incident_id: Option<Uuid>,
    pub trigger_metadata: Option<TriggerMetadata>,
}
