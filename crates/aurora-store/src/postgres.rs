// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Postgres-backed [`Store`] with row-level-security tenant scoping.
//!
//! Expected schema (DDL/migrations are out of scope for this crate — this
//! is the contract every query below assumes):
//!
//! ```sql
//! -- every table below additionally carries a row-level-security policy
//! -- of the form `USING (tenant_id = current_setting('app.current_user_id')::uuid)`
//! create table raw_alert_events (
//!     id uuid primary key, tenant_id uuid not null, source_type text not null,
//!     dedup_key text not null, title text not null, status_raw text not null,
//!     severity_raw text, service text, incident_id uuid, payload jsonb not null,
//!     received_at timestamptz not null,
//!     unique (tenant_id, source_type, dedup_key)
//! );
//! create table incidents (
//!     id uuid primary key, tenant_id uuid not null, source_type text not null,
//!     source_alert_id text not null, status text not null, aurora_status text not null,
//!     severity text not null, alert_title text not null, alert_service text,
//!     affected_services jsonb not null default '[]', correlated_alert_count int not null default 0,
//!     aurora_summary text, aurora_chat_session_id uuid, alert_metadata jsonb not null default '{}',
//!     merged_into_incident_id uuid, started_at timestamptz not null, updated_at timestamptz not null,
//!     unique (tenant_id, source_type, source_alert_id)
//! );
//! create table incident_alerts (
//!     incident_id uuid not null, raw_event_id uuid not null, tenant_id uuid not null,
//!     correlation_strategy text not null, correlation_score real not null,
//!     correlation_details jsonb not null default '{}', created_at timestamptz not null
//! );
//! create table incident_thoughts (
//!     id uuid primary key, incident_id uuid not null, tenant_id uuid not null,
//!     thought_type text not null, content text not null, created_at timestamptz not null
//! );
//! create table incident_citations (
//!     incident_id uuid not null, tenant_id uuid not null, citation_key text not null,
//!     tool_name text not null, command text, output text not null, executed_at timestamptz not null,
//!     unique (incident_id, citation_key)
//! );
//! create table incident_suggestions (
//!     id uuid primary key, incident_id uuid not null, tenant_id uuid not null,
//!     suggestion_type text not null, risk text not null, description text not null,
//!     command text, patch jsonb, created_at timestamptz not null
//! );
//! create table chat_sessions (
//!     id uuid primary key, tenant_id uuid not null, title text not null, status text not null,
//!     incident_id uuid, trigger_metadata jsonb, created_at timestamptz not null, updated_at timestamptz not null
//! );
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::*;
use crate::{Result, Store};

/// A connection pool with tenant scoping applied through a session variable
/// read by every row-level-security policy, rather than by trusting callers
/// to filter `WHERE tenant_id = ...` themselves everywhere.
pub struct PgStore {
    admin_pool: PgPool,
    tenant_pool: PgPool,
}

impl PgStore {
    pub async fn connect(cfg: &aurora_config::StoreConfig) -> Result<Self> {
        let admin_pool = PgPoolOptions::new()
            .max_connections(cfg.admin_pool_size)
            .connect(&cfg.database_url)
            .await?;
        let tenant_pool = PgPoolOptions::new()
            .max_connections(cfg.tenant_pool_size)
            .connect(&cfg.database_url)
            .await?;
        Ok(Self { admin_pool, tenant_pool })
    }

    /// Acquire a connection from the tenant pool with `app.current_user_id`
    /// set for the lifetime of the connection, so every row-level-security
    /// policy scopes automatically. Callers never see an unscoped handle.
    async fn tenant_conn(
        &self,
        tenant_id: Uuid,
    ) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        let mut conn = self.tenant_pool.acquire().await?;
        sqlx::query("select set_config('app.current_user_id', $1, false)")
            .bind(tenant_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(conn)
    }
}

fn row_to_raw_event(row: &sqlx::postgres::PgRow) -> std::result::Result<RawAlertEvent, sqlx::Error> {
    Ok(RawAlertEvent {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        source_type: row.try_get("source_type")?,
        dedup_key: row.try_get("dedup_key")?,
        title: row.try_get("title")?,
        status_raw: row.try_get("status_raw")?,
        severity_raw: row.try_get("severity_raw")?,
        service: row.try_get("service")?,
        incident_id: row.try_get("incident_id")?,
        payload: row.try_get("payload")?,
        received_at: row.try_get("received_at")?,
    })
}

fn parse_status(s: &str) -> IncidentStatus {
    match s {
        "analyzed" => IncidentStatus::Analyzed,
        "resolved" => IncidentStatus::Resolved,
        "merged" => IncidentStatus::Merged,
        _ => IncidentStatus::Investigating,
    }
}

fn parse_aurora_status(s: &str) -> AuroraStatus {
    match s {
        "running" => AuroraStatus::Running,
        "complete" => AuroraStatus::Complete,
        "error" => AuroraStatus::Error,
        _ => AuroraStatus::Idle,
    }
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

fn row_to_incident(row: &sqlx::postgres::PgRow) -> std::result::Result<Incident, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let aurora_status: String = row.try_get("aurora_status")?;
    let severity: String = row.try_get("severity")?;
    let affected_services: serde_json::Value = row.try_get("affected_services")?;
    Ok(Incident {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        source_type: row.try_get("source_type")?,
        source_alert_id: row.try_get("source_alert_id")?,
        status: parse_status(&status),
        aurora_status: parse_aurora_status(&aurora_status),
        severity: parse_severity(&severity),
        alert_title: row.try_get("alert_title")?,
        alert_service: row.try_get("alert_service")?,
        affected_services: serde_json::from_value(affected_services).unwrap_or_default(),
        correlated_alert_count: row.try_get::<i32, _>("correlated_alert_count")? as u32,
        aurora_summary: row.try_get("aurora_summary")?,
        aurora_chat_session_id: row.try_get("aurora_chat_session_id")?,
        alert_metadata: row.try_get("alert_metadata")?,
        merged_into_incident_id: row.try_get("merged_into_incident_id")?,
        started_at: row.try_get("started_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn insert_raw_event(&self, tenant_id: Uuid, event: NewRawEvent) -> Result<bool> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let result = sqlx::query(
            "insert into raw_alert_events \
             (id, tenant_id, source_type, dedup_key, title, status_raw, severity_raw, service, incident_id, payload, received_at) \
             values ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11) \
             on conflict (tenant_id, source_type, dedup_key) do nothing",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&event.source_type)
        .bind(&event.dedup_key)
        .bind(&event.title)
        .bind(&event.status_raw)
        .bind(&event.severity_raw)
        .bind(&event.service)
        .bind(event.incident_id)
        .bind(&event.payload)
        .bind(event.received_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn raw_events_for_incident(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<RawAlertEvent>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let rows = sqlx::query(
            "select * from raw_alert_events where tenant_id = $1 and incident_id = $2 order by received_at",
        )
        .bind(tenant_id)
        .bind(incident_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(row_to_raw_event).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    async fn open_incidents(&self, tenant_id: Uuid) -> Result<Vec<Incident>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let rows = sqlx::query(
            "select * from incidents where tenant_id = $1 and status in ('investigating', 'analyzed')",
        )
        .bind(tenant_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(row_to_incident).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    async fn get_incident(&self, tenant_id: Uuid, incident_id: Uuid) -> Result<Option<Incident>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let row = sqlx::query("select * from incidents where tenant_id = $1 and id = $2")
            .bind(tenant_id)
            .bind(incident_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(row_to_incident).transpose().map_err(Into::into)
    }

    async fn find_incident_by_source(
        &self,
        tenant_id: Uuid,
        source_type: &str,
        source_alert_id: &str,
    ) -> Result<Option<Incident>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let row = sqlx::query(
            "select * from incidents where tenant_id = $1 and source_type = $2 and source_alert_id = $3",
        )
        .bind(tenant_id)
        .bind(source_type)
        .bind(source_alert_id)
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(row_to_incident).transpose().map_err(Into::into)
    }

    async fn upsert_incident(&self, tenant_id: Uuid, upsert: IncidentUpsert) -> Result<Incident> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let now = Utc::now();
        let row = sqlx::query(
            "insert into incidents \
             (id, tenant_id, source_type, source_alert_id, status, aurora_status, severity, \
              alert_title, alert_service, affected_services, correlated_alert_count, alert_metadata, \
              started_at, updated_at) \
             values ($1,$2,$3,$4,$5,'idle',$6,$7,$8,'[]',0,$9,$10,$10) \
             on conflict (tenant_id, source_type, source_alert_id) do update set \
               status = excluded.status, \
               severity = excluded.severity, \
               alert_title = excluded.alert_title, \
               alert_service = coalesce(excluded.alert_service, incidents.alert_service), \
               alert_metadata = incidents.alert_metadata || excluded.alert_metadata, \
               started_at = case \
                 when incidents.status = 'resolved' and excluded.status != 'resolved' \
                 then excluded.started_at else incidents.started_at end, \
               updated_at = excluded.updated_at \
             returning *",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(&upsert.source_type)
        .bind(&upsert.source_alert_id)
        .bind(upsert.status.to_string())
        .bind(upsert.severity.to_string())
        .bind(&upsert.alert_title)
        .bind(&upsert.alert_service)
        .bind(&upsert.alert_metadata)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        row_to_incident(&row).map_err(Into::into)
    }

    async fn merge_incident_metadata(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        patch: serde_json::Value,
    ) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        // `customFields` merges one level deep so a runbook-link update
        // doesn't clobber other custom fields recorded earlier; every other
        // top-level key is a plain overwrite via `||`.
        let result = sqlx::query(
            "update incidents set alert_metadata = jsonb_set( \
               coalesce(alert_metadata, '{}'::jsonb) || ($1::jsonb - 'customFields'), \
               '{customFields}', \
               coalesce(alert_metadata->'customFields', '{}'::jsonb) || coalesce($1::jsonb->'customFields', '{}'::jsonb), \
               true \
             ), updated_at = now() \
             where tenant_id = $2 and id = $3",
        )
        .bind(&patch)
        .bind(tenant_id)
        .bind(incident_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_incident_status(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        status: IncidentStatus,
    ) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let result = sqlx::query(
            "update incidents set status = $1, updated_at = now() where tenant_id = $2 and id = $3",
        )
        .bind(status.to_string())
        .bind(tenant_id)
        .bind(incident_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_incident_summary(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        summary: Option<String>,
    ) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let result = sqlx::query(
            "update incidents set aurora_summary = $1, updated_at = now() where tenant_id = $2 and id = $3",
        )
        .bind(&summary)
        .bind(tenant_id)
        .bind(incident_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_incident_aurora_status(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        status: AuroraStatus,
    ) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let as_str = match status {
            AuroraStatus::Idle => "idle",
            AuroraStatus::Running => "running",
            AuroraStatus::Complete => "complete",
            AuroraStatus::Error => "error",
        };
        let result = sqlx::query(
            "update incidents set aurora_status = $1, updated_at = now() where tenant_id = $2 and id = $3",
        )
        .bind(as_str)
        .bind(tenant_id)
        .bind(incident_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn merge_incident(&self, tenant_id: Uuid, source_id: Uuid, target_id: Uuid) -> Result<()> {
        let mut tx = self.tenant_pool.begin().await?;
        sqlx::query("select set_config('app.current_user_id', $1, true)")
            .bind(tenant_id.to_string())
            .execute(&mut *tx)
            .await?;

        let source = sqlx::query("select * from incidents where tenant_id = $1 and id = $2 for update")
            .bind(tenant_id)
            .bind(source_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|r| row_to_incident(&r))
            .transpose()?
            .ok_or(StoreError::NotFound)?;

        sqlx::query(
            "update incidents set \
               affected_services = (select jsonb_agg(distinct svc) from jsonb_array_elements_text(affected_services || $1) svc), \
               correlated_alert_count = correlated_alert_count + 1, \
               updated_at = now() \
             where tenant_id = $2 and id = $3",
        )
        .bind(serde_json::to_value(&source.affected_services).unwrap_or_default())
        .bind(tenant_id)
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "update incidents set status = 'merged', aurora_summary = null, \
             merged_into_incident_id = $1, updated_at = now() where tenant_id = $2 and id = $3",
        )
        .bind(target_id)
        .bind(tenant_id)
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn link_chat_session(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        chat_session_id: Uuid,
    ) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        sqlx::query(
            "update incidents set aurora_chat_session_id = $1 where tenant_id = $2 and id = $3",
        )
        .bind(chat_session_id)
        .bind(tenant_id)
        .bind(incident_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn add_incident_alert(&self, tenant_id: Uuid, edge: NewIncidentAlert) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        sqlx::query(
            "insert into incident_alerts \
             (incident_id, raw_event_id, tenant_id, correlation_strategy, correlation_score, correlation_details, created_at) \
             values ($1,$2,$3,$4,$5,$6,now())",
        )
        .bind(edge.incident_id)
        .bind(edge.raw_event_id)
        .bind(tenant_id)
        .bind(edge.correlation_strategy.to_string())
        .bind(edge.correlation_score)
        .bind(&edge.correlation_details)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn attach_correlated_alert(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        service: Option<&str>,
        edge: NewIncidentAlert,
    ) -> Result<()> {
        let mut tx = self.tenant_pool.begin().await?;
        sqlx::query("select set_config('app.current_user_id', $1, true)")
            .bind(tenant_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "update incidents set \
               correlated_alert_count = correlated_alert_count + 1, \
               affected_services = case \
                 when $1::text is null or affected_services @> to_jsonb(array[$1::text]) \
                 then affected_services \
                 else affected_services || to_jsonb(array[$1::text]) \
               end, \
               updated_at = now() \
             where tenant_id = $2 and id = $3",
        )
        .bind(service)
        .bind(tenant_id)
        .bind(incident_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query(
            "insert into incident_alerts \
             (incident_id, raw_event_id, tenant_id, correlation_strategy, correlation_score, correlation_details, created_at) \
             values ($1,$2,$3,$4,$5,$6,now())",
        )
        .bind(edge.incident_id)
        .bind(edge.raw_event_id)
        .bind(tenant_id)
        .bind(edge.correlation_strategy.to_string())
        .bind(edge.correlation_score)
        .bind(&edge.correlation_details)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn incident_alerts(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<IncidentAlert>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let rows = sqlx::query(
            "select * from incident_alerts where tenant_id = $1 and incident_id = $2 order by created_at",
        )
        .bind(tenant_id)
        .bind(incident_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter()
            .map(|row| {
                let strategy: String = row.try_get("correlation_strategy")?;
                Ok(IncidentAlert {
                    incident_id: row.try_get("incident_id")?,
                    raw_event_id: row.try_get("raw_event_id")?,
                    correlation_strategy: match strategy.as_str() {
                        "identity" => CorrelationStrategy::Identity,
                        "service_fingerprint" => CorrelationStrategy::ServiceFingerprint,
                        "service_time_window" => CorrelationStrategy::ServiceTimeWindow,
                        "manual" => CorrelationStrategy::Manual,
                        _ => CorrelationStrategy::Primary,
                    },
                    correlation_score: row.try_get("correlation_score")?,
                    correlation_details: row.try_get("correlation_details")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<std::result::Result<_, sqlx::Error>>()
            .map_err(Into::into)
    }

    async fn add_thought(&self, tenant_id: Uuid, thought: NewIncidentThought) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        sqlx::query(
            "insert into incident_thoughts (id, incident_id, tenant_id, thought_type, content, created_at) \
             values ($1,$2,$3,$4,$5,now())",
        )
        .bind(Uuid::new_v4())
        .bind(thought.incident_id)
        .bind(tenant_id)
        .bind(&thought.thought_type)
        .bind(&thought.content)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn thoughts_for_incident(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
    ) -> Result<Vec<IncidentThought>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let rows = sqlx::query(
            "select * from incident_thoughts where tenant_id = $1 and incident_id = $2 order by created_at",
        )
        .bind(tenant_id)
        .bind(incident_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(IncidentThought {
                    id: row.try_get("id")?,
                    incident_id: row.try_get("incident_id")?,
                    thought_type: row.try_get("thought_type")?,
                    content: row.try_get("content")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<std::result::Result<_, sqlx::Error>>()
            .map_err(Into::into)
    }

    async fn add_citation(&self, tenant_id: Uuid, citation: NewIncidentCitation) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        sqlx::query(
            "insert into incident_citations \
             (incident_id, tenant_id, citation_key, tool_name, command, output, executed_at) \
             values ($1,$2,$3,$4,$5,$6,now()) \
             on conflict (incident_id, citation_key) do nothing",
        )
        .bind(citation.incident_id)
        .bind(tenant_id)
        .bind(&citation.citation_key)
        .bind(&citation.tool_name)
        .bind(&citation.command)
        .bind(&citation.output)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn add_suggestion(&self, tenant_id: Uuid, suggestion: NewIncidentSuggestion) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let type_str = match suggestion.suggestion_type {
            SuggestionType::Diagnostic => "diagnostic",
            SuggestionType::Mitigation => "mitigation",
            SuggestionType::Communication => "communication",
            SuggestionType::Fix => "fix",
        };
        let risk_str = match suggestion.risk {
            SuggestionRisk::Safe => "safe",
            SuggestionRisk::Moderate => "moderate",
            SuggestionRisk::Destructive => "destructive",
        };
        sqlx::query(
            "insert into incident_suggestions \
             (id, incident_id, tenant_id, suggestion_type, risk, description, command, patch, created_at) \
             values ($1,$2,$3,$4,$5,$6,$7,$8,now())",
        )
        .bind(Uuid::new_v4())
        .bind(suggestion.incident_id)
        .bind(tenant_id)
        .bind(type_str)
        .bind(risk_str)
        .bind(&suggestion.description)
        .bind(&suggestion.command)
        .bind(suggestion.patch.as_ref().map(|p| serde_json::to_value(p).unwrap_or_default()))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn create_chat_session(
        &self,
        tenant_id: Uuid,
        session: NewChatSession,
    ) -> Result<ChatSession> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let now = Utc::now();
        let id = Uuid::new_v4();
        sqlx::query(
            "insert into chat_sessions (id, tenant_id, title, status, incident_id, trigger_metadata, created_at, updated_at) \
             values ($1,$2,$3,'active',$4,$5,$6,$6)",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&session.title)
        .bind(session.incident_id)
        .bind(session.trigger_metadata.as_ref().map(|m| serde_json::to_value(m).unwrap_or_default()))
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(ChatSession {
            id,
            tenant_id,
            title: session.title,
            status: ChatSessionStatus::Active,
            incident_id: session.incident_id,
            trigger_metadata: session.trigger_metadata,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_chat_session(&self, tenant_id: Uuid, session_id: Uuid) -> Result<Option<ChatSession>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let row = sqlx::query("select * from chat_sessions where tenant_id = $1 and id = $2")
            .bind(tenant_id)
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(row_to_chat_session).transpose().map_err(Into::into)
    }

    async fn chat_session_for_incident_and_source(
        &self,
        tenant_id: Uuid,
        incident_id: Uuid,
        trigger_source: &str,
    ) -> Result<Option<ChatSession>> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let row = sqlx::query(
            "select * from chat_sessions where tenant_id = $1 and incident_id = $2 \
             and trigger_metadata->>'source' = $3 limit 1",
        )
        .bind(tenant_id)
        .bind(incident_id)
        .bind(trigger_source)
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(row_to_chat_session).transpose().map_err(Into::into)
    }

    async fn update_chat_session_status(
        &self,
        tenant_id: Uuid,
        session_id: Uuid,
        status: ChatSessionStatus,
    ) -> Result<()> {
        let mut conn = self.tenant_conn(tenant_id).await?;
        let status_str = match status {
            ChatSessionStatus::Active => "active",
            ChatSessionStatus::InProgress => "in_progress",
            ChatSessionStatus::Completed => "completed",
            ChatSessionStatus::Cancelled => "cancelled",
        };
        let result = sqlx::query(
            "update chat_sessions set status = $1, updated_at = now() where tenant_id = $2 and id = $3",
        )
        .bind(status_str)
        .bind(tenant_id)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_chat_session(row: &sqlx::postgres::PgRow) -> std::result::Result<ChatSession, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let trigger_metadata: Option<serde_json::Value> = row.try_get("trigger_metadata")?;
    Ok(ChatSession {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        title: row.try_get("title")?,
        status: match status.as_str() {
            "in_progress" => ChatSessionStatus::InProgress,
            "completed" => ChatSessionStatus::Completed,
            "cancelled" => ChatSessionStatus::Cancelled,
            _ => ChatSessionStatus::Active,
        },
        incident_id: row.try_get("incident_id")?,
        trigger_metadata: trigger_metadata.and_then(|v| serde_json::from_value(v).ok()),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// Keeps the admin pool reachable for future admin-only operations (e.g.
// tenant provisioning) without widening the `Store` trait prematurely.
impl PgStore {
    pub fn admin_pool(&self) -> &PgPool {
        &self.admin_pool
    }
}
