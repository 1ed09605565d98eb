// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! In-process `Store` implementation.
//!
//! Backs unit/integration tests and lets the pipeline run without a
//! Postgres instance. Tenant scoping is enforced the same way the real
//! backend enforces row-level security: every lookup filters by
//! `tenant_id` explicitly rather than relying on callers to do so.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::*;
use crate::{Result, Store};

#[derive(Default)]
struct Tables {
    raw_events: HashMap<Uuid, RawAlertEvent>,
    incidents: HashMap<Uuid, Incident>,
    incident_alerts: Vec<IncidentAlert>,
    thoughts: Vec<IncidentThought>,
    citations: Vec<IncidentCitation>,
    suggestions: Vec<NewIncidentSuggestion>,
    chat_sessions: HashMap<Uuid, ChatSession>,
}

/// In-memory store, suitable for tests and for a single-process deployment
/// that doesn't need durability across restarts.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_raw_event(&self, tenant_id: Uuid, event: NewRawEvent) -> Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let dup = t.raw_events.values().any(|e| {
            e.tenant_id == tenant_id
                && e.source_type == event.source_type
                && e.dedup_key == event.dedup_key
        });
        if dup {
            return Ok(false);
        }
        let row = RawAlertEvent {
            id: Uuid::new_v4(),
            tenant_id,
            source_type: event.source_type,
            dedup_key: event.dedup_key,
            title: event.title,
            status_raw: event.status_raw,
            severity_raw: event.severity_raw,
            service: event.service,
            incident_id: event.incident_id,
            payload: event.payload,
            received_at: event.received_at,
        };
        t.raw_events.insert(row.id, row);
        Ok(true)
    }

    async fn raw_events_for_incident(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<RawAlertEvent>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<RawAlertEvent> = t
            .raw_events
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.incident_id == Some(incident_id))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.received_at);
        Ok(rows)
    }

    async fn open_incidents(&self, tenant_id: Uuid) -> Result<Vec<Incident>> {
        let t = self.tables.lock().unwrap();
        Ok(t.incidents
            .values()
            .filter(|i| {
                i.tenant_id == tenant_id
                    && matches!(i.status, IncidentStatus::Investigating | IncidentStatus::Analyzed)
            })
            .cloned()
            .collect())
    }

    async fn get_incident(&self, tenant_id: Uuid, incident_id: Uuid) -> Result<Option<Incident>> {
        let t = self.tables.lock().unwrap();
        Ok(t.incidents
            .get(&incident_id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_incident_by_source(
        &self,
        tenant_id: Uuid,
        source_type: &str,
        source_alert_id: &str,
    ) -> Result<Option<Incident>> {
        let t = self.tables.lock().unwrap();
        Ok(t.incidents
            .values()
            .find(|i| {
                i.tenant_id == tenant_id
                    && i.source_type == source_type
                    && i.source_alert_id == source_alert_id
            })
            .cloned())
    }

    async fn upsert_incident(&self, tenant_id: Uuid, upsert: IncidentUpsert) -> Result<Incident> {
        let mut t = self.tables.lock().unwrap();
        if let Some(existing) = t.incidents.values_mut().find(|i| {
            i.tenant_id == tenant_id
                && i.source_type == upsert.source_type
                && i.source_alert_id == upsert.source_alert_id
        }) {
            if existing.status == IncidentStatus::Resolved && upsert.status != IncidentStatus::Resolved {
                existing.started_at = upsert.received_at;
            }
            existing.status = upsert.status;
            existing.severity = upsert.severity;
            existing.alert_title = upsert.alert_title;
            if upsert.alert_service.is_some() {
                existing.alert_service = upsert.alert_service;
            }
            merge_json_object(&mut existing.alert_metadata, &upsert.alert_metadata);
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let row = Incident {
            id: Uuid::new_v4(),
            tenant_id,
            source_type: upsert.source_type,
            source_alert_id: upsert.source_alert_id,
            status: upsert.status,
            aurora_status: AuroraStatus::Idle,
            severity: upsert.severity,
            alert_title: upsert.alert_title,
            alert_service: upsert.alert_service,
            affected_services: Vec::new(),
            correlated_alert_count: 0,
            aurora_summary: None,
            aurora_chat_session_id: None,
            alert_metadata: upsert.alert_metadata,
            merged_into_incident_id: None,
            started_at: upsert.received_at,
            updated_at: upsert.received_at,
        };
        t.incidents.insert(row.id, row.clone());
        Ok(row)
    }

    async fn merge_incident_metadata(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        patch: serde_json::Value,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let incident = t
            .incidents
            .get_mut(&incident_id)
            .filter(|i| i.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)?;
        merge_json_object(&mut incident.alert_metadata, &patch);
        incident.updated_at = Utc::now();
        Ok(())
    }

    async fn update_incident_status(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        status: IncidentStatus,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let incident = t
            .incidents
            .get_mut(&incident_id)
            .filter(|i| i.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)?;
        incident.status = status;
        incident.updated_at = Utc::now();
        Ok(())
    }

    async fn set_incident_summary(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        summary: Option<String>,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let incident = t
            .incidents
            .get_mut(&incident_id)
            .filter(|i| i.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)?;
        incident.aurora_summary = summary;
        incident.updated_at = Utc::now();
        Ok(())
    }

    async fn set_incident_aurora_status(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        status: AuroraStatus,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let incident = t
            .incidents
            .get_mut(&incident_id)
            .filter(|i| i.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)?;
        incident.aurora_status = status;
        incident.updated_at = Utc::now();
        Ok(())
    }

    async fn merge_incident(&self, tenant_id: Uuid, source_id: Uuid, target_id: Uuid) -> Result<()> {
        let mut t = self.tables.lock().unwrap();

        let target_services = {
            let target = t
                .incidents
                .get(&target_id)
                .filter(|i| i.tenant_id == tenant_id)
                .ok_or(StoreError::NotFound)?;
            target.affected_services.clone()
        };
        let (source_services, source_count) = {
            let source = t
                .incidents
                .get(&source_id)
                .filter(|i| i.tenant_id == tenant_id)
                .ok_or(StoreError::NotFound)?;
            (source.affected_services.clone(), 1)
        };

        {
            let target = t.incidents.get_mut(&target_id).ok_or(StoreError::NotFound)?;
            let mut services = target_services;
            for s in source_services {
                if !services.contains(&s) {
                    services.push(s);
                }
            }
            target.affected_services = services;
            target.correlated_alert_count += source_count;
            target.updated_at = Utc::now();
        }
        {
            let source = t.incidents.get_mut(&source_id).ok_or(StoreError::NotFound)?;
            source.status = IncidentStatus::Merged;
            source.aurora_summary = None;
            source.merged_into_incident_id = Some(target_id);
            source.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn link_chat_session(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        chat_session_id: Uuid,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let incident = t
            .incidents
            .get_mut(&incident_id)
            .filter(|i| i.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)?;
        incident.aurora_chat_session_id = Some(chat_session_id);
        Ok(())
    }

    async fn add_incident_alert(&self, _tenant_id: Uuid, edge: NewIncidentAlert) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        t.incident_alerts.push(IncidentAlert {
            incident_id: edge.incident_id,
            raw_event_id: edge.raw_event_id,
            correlation_strategy: edge.correlation_strategy,
            correlation_score: edge.correlation_score,
            correlation_details: edge.correlation_details,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn attach_correlated_alert(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        service: Option<&str>,
        edge: NewIncidentAlert,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        {
            let incident = t
                .incidents
                .get_mut(&incident_id)
                .filter(|i| i.tenant_id == tenant_id)
                .ok_or(StoreError::NotFound)?;
            incident.correlated_alert_count += 1;
            if let Some(service) = service {
                if !incident.affected_services.iter().any(|s| s == service) {
                    incident.affected_services.push(service.to_string());
                }
            }
            incident.updated_at = Utc::now();
        }
        t.incident_alerts.push(IncidentAlert {
            incident_id: edge.incident_id,
            raw_event_id: edge.raw_event_id,
            correlation_strategy: edge.correlation_strategy,
            correlation_score: edge.correlation_score,
            correlation_details: edge.correlation_details,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn incident_alerts(
        &self,
        _tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<IncidentAlert>> {
        let t = self.tables.lock().unwrap();
        Ok(t.incident_alerts
            .iter()
            .filter(|e| e.incident_id == incident_id)
            .cloned()
            .collect())
    }

    async fn add_thought(&self, _tenant_id: Uuid, thought: NewIncidentThought) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        t.thoughts.push(IncidentThought {
            id: Uuid::new_v4(),
            incident_id: thought.incident_id,
            thought_type: thought.thought_type,
            content: thought.content,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn thoughts_for_incident(
        &self,
        _tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<IncidentThought>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<IncidentThought> = t
            .thoughts
            .iter()
            .filter(|th| th.incident_id == incident_id)
            .cloned()
            .collect();
        rows.sort_by_key(|th| th.created_at);
        Ok(rows)
    }

    async fn add_citation(&self, _tenant_id: Uuid, citation: NewIncidentCitation) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        t.citations.push(IncidentCitation {
            incident_id: citation.incident_id,
            citation_key: citation.citation_key,
            tool_name: citation.tool_name,
            command: citation.command,
            output: citation.output,
            executed_at: Utc::now(),
        });
        Ok(())
    }

    async fn add_suggestion(
        &self,
        _tenant_id: Uuid,
        suggestion: NewIncidentSuggestion,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        t.suggestions.push(suggestion);
        Ok(())
    }

    async fn create_chat_session(
        &self,
        tenant_id: Uuid,
        session: NewChatSession,
    ) -> Result<ChatSession> {
        let mut t = self.tables.lock().unwrap();
        let now = Utc::now();
        let row = ChatSession {
            id: Uuid::new_v4(),
            tenant_id,
            title: session.title,
            status: ChatSessionStatus::Active,
            incident_id: session.incident_id,
            trigger_metadata: session.trigger_metadata,
            created_at: now,
            updated_at: now,
        };
        t.chat_sessions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_chat_session(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<ChatSession>> {
        let t = self.tables.lock().unwrap();
        Ok(t.chat_sessions
            .get(&session_id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    async fn chat_session_for_incident_and_source(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        trigger_source: &str,
    ) -> Result<Option<ChatSession>> {
        let t = self.tables.lock().unwrap();
        Ok(t.chat_sessions
            .values()
            .find(|s| {
                s.tenant_id == tenant_id
                    && s.incident_id == Some(incident_id)
                    && s.trigger_metadata
                        .as_ref()
                        .map(|m| m.source == trigger_source)
                        .unwrap_or(false)
            })
            .cloned())
    }

    async fn update_chat_session_status(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        status: ChatSessionStatus,
    ) -> Result<()> {
        let mut t = self.tables.lock().unwrap();
        let session = t
            .chat_sessions
            .get_mut(&session_id)
            .filter(|s| s.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound)?;
        session.status = status;
        session.updated_at = Utc::now();
        Ok(())
    }
}

/// Shallow merge of `patch` into `base` when both are JSON objects — keys in
/// `patch` overwrite `base`, keys present only in `base` are preserved.
fn merge_json_object(base: &mut serde_json::Value, patch: &serde_json::Value) {
    let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) else {
        if !patch.is_null() {
            *base = patch.clone();
        }
        return;
    };
    for (k, v) in patch_obj {
        base_obj
            .entry(k.clone())
            .and_modify(|existing| merge_json_object(existing, v))
            .or_insert_with(|| v.clone());
    }
}
