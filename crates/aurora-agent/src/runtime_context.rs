// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Runtime context for an agent run.
//!
//! This is separate from [`aurora_config::AgentConfig`], which holds only
//! config-file fields.  [`AgentRuntimeContext`] carries values bound at
//! construction time: the identity the run executes under, the incident it
//! is investigating, and any operator-supplied prompt overrides.

use uuid::Uuid;

/// Context injected into an agent at construction time, scoping a single run
/// to one tenant, one incident, and (when triggered interactively) one user.
#[derive(Debug, Default, Clone)]
pub struct AgentRuntimeContext {
    /// Tenant the run is scoped to. Every tool call and persisted record is
    /// stamped with this id so row-level security in the store layer applies.
    pub tenant_id: Option<Uuid>,
    /// Incident under investigation, if this run was triggered by one.
    pub incident_id: Option<Uuid>,
    /// User who opened the live session, if any. `None` for unattended RCA
    /// runs kicked off by the queue worker.
    pub user_id: Option<Uuid>,
    /// Free-text summary of the incident injected into the system prompt
    /// (title, severity, affected service, alert excerpt).
    pub incident_summary: Option<String>,
    /// Text appended after the default Guidelines section.
    pub append_system_prompt: Option<String>,
    /// Full system prompt override. When set, replaces
    /// [`aurora_config::AgentConfig::system_prompt`] entirely.
    pub system_prompt_override: Option<String>,
}

impl AgentRuntimeContext {
    pub fn for_incident(tenant_id: Uuid, incident_id: Uuid, incident_summary: String) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            incident_id: Some(incident_id),
            incident_summary: Some(incident_summary),
            ..Default::default()
        }
    }
}
