// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Executes one queue job against the agent engine.

use std::sync::Arc;

use aurora_agent::{Agent, AgentEvent, AgentRuntimeContext};
use aurora_config::{AgentConfig, ModelConfig, ToolsConfig};
use aurora_incidents::merge_incidents;
use aurora_secrets::SecretStore;
use aurora_store::{
    AuroraStatus, ChatSessionStatus, Incident, NewChatSession, NewIncidentCitation,
    NewIncidentThought, Store, TriggerMetadata,
};
use aurora_tools::{ConfirmationBroker, ToolPolicy, ToolRegistry};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::jobs::{ContextUpdateJob, RcaTrigger, SummaryGenerationJob};
use crate::runbook::{build_rca_prompt, fetch_runbook};

/// Dependencies shared by every worker, cloned (cheaply, via `Arc`) into
/// each job execution.
#[derive(Clone)]
pub struct WorkerDeps {
    pub store: Arc<dyn Store>,
    pub model_config: ModelConfig,
    pub agent_config: Arc<AgentConfig>,
    pub tools_config: ToolsConfig,
    pub secrets: Arc<SecretStore>,
    /// Event channel capacity between the agent loop and the persistence
    /// drain task; mirrors `GatewayConfig::event_channel_capacity`.
    pub event_channel_capacity: usize,
}

fn incident_details_block(incident: &Incident) -> String {
    format!(
        "Title: {}\nSeverity: {}\nStatus: {}\nPrimary service: {}\nAffected services: {}\n",
        incident.alert_title,
        incident.severity,
        incident.status,
        incident.alert_service.as_deref().unwrap_or("unknown"),
        if incident.affected_services.is_empty() {
            "none recorded".to_string()
        } else {
            incident.affected_services.join(", ")
        }
    )
}

async fn build_agent(
    deps: &WorkerDeps,
    runtime: AgentRuntimeContext,
    tools: ToolRegistry,
) -> Result<Agent, QueueError> {
    let model: Arc<dyn aurora_model::ModelProvider> = Arc::from(aurora_model::from_config(&deps.model_config)?);
    let (_tool_event_tx, tool_event_rx) = mpsc::channel(1);
    let max_context_tokens = model.catalog_context_window().unwrap_or(128_000) as usize;

    Ok(Agent::new(
        model,
        Arc::new(tools),
        deps.agent_config.clone(),
        runtime,
        Arc::new(Mutex::new(aurora_config::AgentMode::Agent)),
        tool_event_rx,
        max_context_tokens,
        ToolPolicy::from_config(&deps.tools_config),
        Arc::new(ConfirmationBroker::new()),
    ))
}

/// Runs an agent turn to completion, persisting thoughts/citations as they
/// stream in. Returns the concatenated final assistant text, if any.
async fn drive_agent(
    store: &dyn Store,
    tenant_id: Uuid,
    incident_id: Uuid,
    mut agent: Agent,
    prompt: String,
    capacity: usize,
) -> Result<Option<String>, QueueError> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(capacity.max(1));

    let store_clone: &dyn Store = store;
    let drain = async move {
        let mut final_text: Option<String> = None;
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::ThinkingComplete(text) | AgentEvent::TextComplete(text) => {
                    if !text.trim().is_empty() {
                        let _ = store_clone
                            .add_thought(
                                tenant_id,
                                NewIncidentThought {
                                    incident_id,
                                    thought_type: "reasoning".into(),
                                    content: text.clone(),
                                },
                            )
                            .await;
                        final_text = Some(text);
                    }
                }
                AgentEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    output,
                    is_error,
                } => {
                    let _ = store_clone
                        .add_citation(
                            tenant_id,
                            NewIncidentCitation {
                                incident_id,
                                citation_key: call_id,
                                tool_name,
                                command: None,
                                output: if is_error { format!("ERROR: {output}") } else { output },
                            },
                        )
                        .await;
                }
                AgentEvent::Error(message) => {
                    warn!(incident_id = %incident_id, message, "agent run reported an error");
                }
                AgentEvent::TurnComplete | AgentEvent::Aborted { .. } => break,
                _ => {}
            }
        }
        final_text
    };

    let (drive_result, final_text) = tokio::join!(agent.submit(&prompt, tx), drain);
    drive_result.map_err(|e| QueueError::Agent(e.to_string()))?;
    Ok(final_text)
}

pub async fn run_rca_trigger(deps: &WorkerDeps, job: RcaTrigger) -> Result<(), QueueError> {
    if deps
        .store
        .chat_session_for_incident_and_source(job.tenant_id, job.incident_id, &job.source)
        .await?
        .is_some()
    {
        info!(incident_id = %job.incident_id, source = %job.source, "RCA session already exists, skipping trigger");
        return Ok(());
    }

    let Some(incident) = deps.store.get_incident(job.tenant_id, job.incident_id).await? else {
        warn!(incident_id = %job.incident_id, "RCA trigger fired for an incident that no longer exists");
        return Ok(());
    };

    let runbook = match incident.runbook_link() {
        Some(url) => fetch_runbook(url).await,
        None => None,
    };
    let prompt = build_rca_prompt(runbook.as_deref(), &incident_details_block(&incident));

    let session = deps
        .store
        .create_chat_session(
            job.tenant_id,
            NewChatSession {
                title: format!("RCA: {}", incident.alert_title),
                incident_id: Some(incident.id),
                trigger_metadata: Some(TriggerMetadata {
                    source: job.source.clone(),
                    incident_id: incident.id,
                }),
            },
        )
        .await?;
    deps.store.link_chat_session(job.tenant_id, incident.id, session.id).await?;
    deps.store
        .set_incident_aurora_status(job.tenant_id, incident.id, AuroraStatus::Running)
        .await?;

    let runtime = AgentRuntimeContext::for_incident(job.tenant_id, incident.id, incident_details_block(&incident));
    let tools = crate::tools::build_registry(deps.secrets.clone(), job.tenant_id);
    let agent = build_agent(deps, runtime, tools).await?;

    let outcome = drive_agent(
        deps.store.as_ref(),
        job.tenant_id,
        incident.id,
        agent,
        prompt,
        deps.event_channel_capacity,
    )
    .await;

    match outcome {
        Ok(summary) => {
            if let Some(summary) = summary {
                deps.store.set_incident_summary(job.tenant_id, incident.id, Some(summary)).await?;
            }
            deps.store
                .set_incident_aurora_status(job.tenant_id, incident.id, AuroraStatus::Complete)
                .await?;
            deps.store
                .update_chat_session_status(job.tenant_id, session.id, ChatSessionStatus::Completed)
                .await?;
        }
        Err(e) => {
            error!(incident_id = %incident.id, error = %e, "RCA agent run failed");
            deps.store
                .set_incident_aurora_status(job.tenant_id, incident.id, AuroraStatus::Error)
                .await?;
        }
    }

    Ok(())
}

pub async fn run_context_update(deps: &WorkerDeps, job: ContextUpdateJob) -> Result<(), QueueError> {
    deps.store
        .add_thought(
            job.tenant_id,
            NewIncidentThought {
                incident_id: job.target_incident_id,
                thought_type: "context_update".into(),
                content: job.summary_block,
            },
        )
        .await?;
    Ok(())
}

pub async fn run_summary_generation(deps: &WorkerDeps, job: SummaryGenerationJob) -> Result<(), QueueError> {
    let Some(incident) = deps.store.get_incident(job.tenant_id, job.incident_id).await? else {
        return Ok(());
    };

    let runtime = AgentRuntimeContext::for_incident(job.tenant_id, incident.id, incident_details_block(&incident));
    let agent = build_agent(deps, runtime, ToolRegistry::new()).await?;

    let prompt = format!(
        "Write a two-to-three sentence incident summary for this alert:\n{}",
        incident_details_block(&incident)
    );
    let summary = drive_agent(
        deps.store.as_ref(),
        job.tenant_id,
        incident.id,
        agent,
        prompt,
        deps.event_channel_capacity,
    )
    .await?;

    if let Some(summary) = summary {
        deps.store.set_incident_summary(job.tenant_id, incident.id, Some(summary)).await?;
    }
    Ok(())
}

/// Executes a manual merge (not itself a queued job kind — called directly
/// by the gateway's merge endpoint) and enqueues the resulting context
/// update, if any, onto `scheduler`.
pub async fn perform_merge(
    deps: &WorkerDeps,
    scheduler: &crate::scheduler::Scheduler,
    tenant_id: Uuid,
    source_id: Uuid,
    target_id: Uuid,
) -> Result<(), QueueError> {
    let outcome = merge_incidents(deps.store.as_ref(), tenant_id, source_id, target_id).await?;
    if let Some(session_id) = outcome.source_chat_session_id {
        deps.store
            .update_chat_session_status(tenant_id, session_id, ChatSessionStatus::Cancelled)
            .await?;
    }
    if let Some(update) = outcome.context_update {
        scheduler.schedule(
            crate::jobs::Job::ContextUpdate(ContextUpdateJob {
                tenant_id,
                target_incident_id: update.target_incident_id,
                summary_block: update.summary_block,
            }),
            chrono::Utc::now(),
        );
    }
    Ok(())
}
