// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Manual, user-triggered incident merge.

use aurora_store::{CorrelationStrategy, Incident, NewIncidentAlert, Store};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::IncidentError;

/// Bound on how far `merged_into_incident_id` is walked when checking for a
/// cycle. An incident graph deeper than this indicates a bug elsewhere
/// (merges are meant to collapse quickly into one root), not a legitimate
/// long chain, so it is treated as an error rather than looped forever.
const MAX_MERGE_CHAIN_HOPS: usize = 32;

/// Outcome of a manual merge the caller must act on.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Set when the target incident has a live RCA session and should
    /// receive a context-update block on its next agent turn.
    pub context_update: Option<ContextUpdate>,
    pub source_chat_session_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ContextUpdate {
    pub target_incident_id: Uuid,
    pub summary_block: String,
}

/// Merge `source_id` into `target_id`: copies the source's primary alert
/// into the target's `incident_alerts` with strategy `manual`, unions
/// `affected_services`, increments `correlated_alert_count`, and marks the
/// source `merged`.
pub async fn merge(
    store: &dyn Store,
    tenant_id: Uuid,
    source_id: Uuid,
    target_id: Uuid,
) -> Result<MergeOutcome, IncidentError> {
    if source_id == target_id {
        return Err(IncidentError::MalformedPayload(
            "cannot merge an incident into itself".into(),
        ));
    }

    guard_against_cycle(store, tenant_id, source_id, target_id).await?;

    let source = store
        .get_incident(tenant_id, source_id)
        .await?
        .ok_or(aurora_store::StoreError::NotFound)?;
    let target = store
        .get_incident(tenant_id, target_id)
        .await?
        .ok_or(aurora_store::StoreError::NotFound)?;

    let source_alerts = store.incident_alerts(tenant_id, source_id).await?;
    if let Some(primary) = source_alerts.iter().find(|a| a.correlation_strategy == CorrelationStrategy::Primary) {
        store
            .attach_correlated_alert(
                tenant_id,
                target_id,
                source.alert_service.as_deref(),
                NewIncidentAlert {
                    incident_id: target_id,
                    raw_event_id: primary.raw_event_id,
                    correlation_strategy: CorrelationStrategy::Manual,
                    correlation_score: 1.0,
                    correlation_details: json!({ "merged_from_incident": source_id }),
                },
            )
            .await?;
    }

    store.merge_incident(tenant_id, source_id, target_id).await?;

    info!(source = %source_id, target = %target_id, "merged incident");

    let context_update = if target.aurora_chat_session_id.is_some() {
        let thoughts = store.thoughts_for_incident(tenant_id, source_id).await?;
        Some(ContextUpdate {
            target_incident_id: target_id,
            summary_block: build_context_update(&source, &thoughts),
        })
    } else {
        None
    };

    Ok(MergeOutcome {
        context_update,
        source_chat_session_id: source.aurora_chat_session_id,
    })
}

/// Builds the context-update text block injected into the target agent's
/// next turn, carrying the source incident's identity and its last 20
/// thoughts.
fn build_context_update(source: &Incident, thoughts: &[aurora_store::IncidentThought]) -> String {
    let mut block = format!(
        "=== MERGED INCIDENT ===\nTitle: {}\nSeverity: {}\n",
        source.alert_title, source.severity
    );
    if let Some(summary) = &source.aurora_summary {
        block.push_str(&format!("Prior summary: {summary}\n"));
    }
    let trailing: Vec<&aurora_store::IncidentThought> = thoughts.iter().rev().take(20).collect();
    if !trailing.is_empty() {
        block.push_str("Trailing thoughts (most recent last):\n");
        for thought in trailing.into_iter().rev() {
            block.push_str(&format!("- [{}] {}\n", thought.thought_type, thought.content));
        }
    }
    block
}

/// Before merging `source` into `target`, walk `target`'s
/// `merged_into_incident_id` chain to confirm `target` is not already (even
/// transitively) merged into `source` — that would create a cycle.
async fn guard_against_cycle(
    store: &dyn Store,
    tenant_id: Uuid,
    source_id: Uuid,
    target_id: Uuid,
) -> Result<(), IncidentError> {
    let mut current = target_id;
    for _ in 0..MAX_MERGE_CHAIN_HOPS {
        let Some(incident) = store.get_incident(tenant_id, current).await? else {
            return Ok(());
        };
        match incident.merged_into_incident_id {
            Some(next) if next == source_id => return Err(IncidentError::MergeCycle(source_id)),
            Some(next) => current = next,
            None => return Ok(()),
        }
    }
    Err(IncidentError::MergeCycle(source_id))
}
