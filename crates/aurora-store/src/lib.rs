// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tenant-scoped persistence layer.
//!
//! Every row in the schema below belongs to exactly one tenant (`user_id`).
//! The [`Store`] trait never exposes a raw connection pool to callers —
//! only a handle that has already been scoped to a tenant, so there is no
//! code path that can accidentally run a cross-tenant query.
//!
//! Two implementations are provided: [`PgStore`], backed by Postgres via
//! `sqlx` with row-level security enforced by a `current_user_id` session
//! variable, and [`MemoryStore`], an in-process implementation used in
//! tests and for running the pipeline without a database.

pub mod error;
mod memory;
mod postgres;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use types::*;

use async_trait::async_trait;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Tenant-scoped persistence operations.
///
/// Implementations must enforce that every read and write is confined to
/// the `tenant_id` passed in — there is no "admin mode" escape hatch in
/// this trait; cross-tenant operations (none exist in this system) would
/// need a separate, explicitly-named trait.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Raw events ────────────────────────────────────────────────────────

    /// Insert a raw alert event. Returns `Ok(false)` without writing when an
    /// event with the same `(source_type, dedup_key)` already exists for this
    /// tenant (idempotent ingestion).
    async fn insert_raw_event(&self, tenant_id: Uuid, event: NewRawEvent) -> Result<bool>;

    /// All raw events belonging to an incident, ordered by `received_at`.
    async fn raw_events_for_incident(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<RawAlertEvent>>;

    // ── Incidents ─────────────────────────────────────────────────────────

    /// Fetch the open (non-merged) incidents for a tenant's correlation
    /// window — candidates considered by the correlator.
    async fn open_incidents(&self, tenant_id: Uuid) -> Result<Vec<Incident>>;

    async fn get_incident(&self, tenant_id: Uuid, incident_id: Uuid) -> Result<Option<Incident>>;

    async fn find_incident_by_source(
        &self,
        tenant_id: Uuid,
        source_type: &str,
        source_alert_id: &str,
    ) -> Result<Option<Incident>>;

    /// Insert a new incident, or update the existing row matching
    /// `(source_type, source_alert_id, tenant_id)`. Returns the resulting
    /// incident.
    async fn upsert_incident(&self, tenant_id: Uuid, upsert: IncidentUpsert) -> Result<Incident>;

    /// Merge `patch` into an existing incident's `alert_metadata` without
    /// touching status, severity, or title. Used for source-specific
    /// metadata-only follow-up events (e.g. a PagerDuty custom-field
    /// update) that should not be treated as a new alert.
    async fn merge_incident_metadata(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        patch: serde_json::Value,
    ) -> Result<()>;

    async fn update_incident_status(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        status: IncidentStatus,
    ) -> Result<()>;

    async fn set_incident_summary(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        summary: Option<String>,
    ) -> Result<()>;

    async fn set_incident_aurora_status(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        status: AuroraStatus,
    ) -> Result<()>;

    async fn merge_incident(
        &self,
        tenant_id: Uuid,
        source_id: Uuid,
        target_id: Uuid,
    ) -> Result<()>;

    async fn link_chat_session(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        chat_session_id: Uuid,
    ) -> Result<()>;

    // ── Incident alerts (correlation edges) ──────────────────────────────

    async fn add_incident_alert(&self, tenant_id: Uuid, edge: NewIncidentAlert) -> Result<()>;

    /// Attach a correlated alert to an existing incident: records the edge,
    /// increments `correlated_alert_count` by one, and unions `service` into
    /// `affected_services` (no-op if already present). Used by the
    /// correlator's match path; the primary-alert path uses
    /// [`Store::upsert_incident`] plus a single `add_incident_alert` call
    /// instead, since it is the first alert on the incident.
    async fn attach_correlated_alert(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        service: Option<&str>,
        edge: NewIncidentAlert,
    ) -> Result<()>;

    async fn incident_alerts(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<IncidentAlert>>;

    // ── Thoughts / citations / suggestions ───────────────────────────────

    async fn add_thought(&self, tenant_id: Uuid, thought: NewIncidentThought) -> Result<()>;

    async fn thoughts_for_incident(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<IncidentThought>>;

    async fn add_citation(&self, tenant_id: Uuid, citation: NewIncidentCitation) -> Result<()>;

    async fn add_suggestion(
        &self,
        tenant_id: Uuid,
        suggestion: NewIncidentSuggestion,
    ) -> Result<()>;

    // ── Chat sessions ─────────────────────────────────────────────────────

    async fn create_chat_session(&self, tenant_id: Uuid, session: NewChatSession) -> Result<ChatSession>;

    async fn get_chat_session(&self, tenant_id: Uuid, session_id: Uuid) -> Result<Option<ChatSession>>;

    async fn chat_session_for_incident_and_source(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        trigger_source: &str,
    ) -> Result<Option<ChatSession>>;

    async fn update_chat_session_status(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        status: ChatSessionStatus,
    ) -> Result<()>;
}
