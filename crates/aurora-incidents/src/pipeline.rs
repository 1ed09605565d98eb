// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-source webhook ingestion: normalize, store, correlate, upsert.

use aurora_config::CorrelationConfig;
use aurora_store::{IncidentUpsert, NewIncidentAlert, NewRawEvent, Store};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::correlator::correlate;
use crate::error::IncidentError;
use crate::normalize::normalize;

/// What the caller (the queue worker, normally) should do after ingesting
/// one webhook delivery.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub incident_id: Uuid,
    /// `true` when this event is eligible to schedule a delayed RCA
    /// trigger — a fresh incident-creation event, not a correlated
    /// follow-up, status update, or metadata-only merge.
    pub schedule_rca: bool,
}

/// Ingest one raw webhook payload for `source_type`, returning `None` when
/// the delivery was a duplicate (idempotent no-op) or a metadata-only event
/// for which no matching incident could be found.
pub async fn ingest(
    store: &dyn Store,
    tenant_id: Uuid,
    source_type: &str,
    payload: &Value,
    correlation_cfg: &CorrelationConfig,
) -> Result<Option<IngestOutcome>, IncidentError> {
    let now = Utc::now();
    let alert = normalize(source_type, payload, now)?;

    let inserted = store
        .insert_raw_event(
            tenant_id,
            NewRawEvent {
                source_type: alert.source_type.clone(),
                dedup_key: alert.dedup_key.clone(),
                title: alert.title.clone(),
                status_raw: alert.status_raw.clone(),
                severity_raw: Some(alert.severity.to_string()),
                service: alert.service.clone(),
                incident_id: None,
                payload: payload.clone(),
                received_at: now,
            },
        )
        .await?;
    if !inserted {
        debug!(source = %source_type, dedup_key = %alert.dedup_key, "duplicate webhook delivery, skipping");
        return Ok(None);
    }

    if alert.metadata_only {
        let incident_key = alert
            .alert_metadata
            .get("incidentId")
            .and_then(Value::as_str);
        let Some(incident_key) = incident_key else {
            return Ok(None);
        };
        let open = store.open_incidents(tenant_id).await?;
        let Some(incident) = open
            .into_iter()
            .filter(|i| i.source_type == alert.source_type)
            .find(|i| {
                i.alert_metadata.get("incidentId").and_then(Value::as_str) == Some(incident_key)
            })
        else {
            debug!(incident_key, "metadata-only event arrived before its incident, dropping");
            return Ok(None);
        };
        store
            .merge_incident_metadata(tenant_id, incident.id, alert.alert_metadata.clone())
            .await?;
        info!(incident_id = %incident.id, "merged metadata-only event into incident");
        return Ok(None);
    }

    if alert.is_creation_event {
        let candidates = store.open_incidents(tenant_id).await?;
        let correlation = correlate(&alert, &candidates, correlation_cfg, now);
        if correlation.is_correlated {
            let incident_id = correlation
                .incident_id
                .expect("is_correlated implies incident_id is set");
            store
                .attach_correlated_alert(
                    tenant_id,
                    incident_id,
                    alert.service.as_deref(),
                    NewIncidentAlert {
                        incident_id,
                        raw_event_id: Uuid::new_v4(),
                        correlation_strategy: correlation.strategy,
                        correlation_score: correlation.score,
                        correlation_details: correlation.details,
                    },
                )
                .await?;
            info!(incident_id = %incident_id, strategy = %correlation.strategy, "alert correlated to existing incident");
            return Ok(Some(IngestOutcome {
                incident_id,
                schedule_rca: false,
            }));
        }
    }

    let incident = store
        .upsert_incident(
            tenant_id,
            IncidentUpsert {
                source_type: alert.source_type.clone(),
                source_alert_id: alert.external_id.clone(),
                status: parse_status(&alert.status_raw),
                severity: alert.severity,
                alert_title: alert.title.clone(),
                alert_service: alert.service.clone(),
                alert_metadata: alert.alert_metadata.clone(),
                received_at: now,
            },
        )
        .await?;

    if alert.is_creation_event {
        store
            .add_incident_alert(
                tenant_id,
                NewIncidentAlert {
                    incident_id: incident.id,
                    raw_event_id: Uuid::new_v4(),
                    correlation_strategy: aurora_store::CorrelationStrategy::Primary,
                    correlation_score: 1.0,
                    correlation_details: Value::Object(Default::default()),
                },
            )
            .await?;
    }

    Ok(Some(IngestOutcome {
        incident_id: incident.id,
        schedule_rca: alert.is_creation_event,
    }))
}

fn parse_status(status_raw: &str) -> aurora_store::IncidentStatus {
    match status_raw {
        "resolved" => aurora_store::IncidentStatus::Resolved,
        "analyzed" => aurora_store::IncidentStatus::Analyzed,
        _ => aurora_store::IncidentStatus::Investigating,
    }
}
