// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `GatewayService` owns the process-wide live-session registry and routes
//! incoming wire messages to per-session agent runs.
//!
//! Sessions are keyed by `(tenant_id, session_id)`. A session's `Agent` lives
//! for as long as the session does — a reconnect swaps the outbound sender
//! without tearing down conversation state or the in-flight run.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{error, warn};
use uuid::Uuid;

use aurora_agent::{Agent, AgentEvent, AgentRuntimeContext};
use aurora_config::{AgentConfig, AgentMode, ModelConfig, ToolsConfig};
use aurora_secrets::SecretStore;
use aurora_store::{NewIncidentCitation, NewIncidentThought, Store};
use aurora_tools::{ConfirmationBroker, ConfirmationDecision, ToolCall, ToolOutput, ToolPolicy};

use crate::control::protocol::{
    ClientMessage, ConfirmationRequestData, ControlAction, ErrorData, MessageData, ServerMessage,
    SessionStatus, StatusData, ToolCallData, ToolResultData,
};

/// Denial string `aurora-agent` emits for a confirmation-gated tool call in
/// `AgentMode::Ask`; mapped here onto the `READ_ONLY_MODE` wire code.
const ASK_MODE_DENIAL: &str = "this tool requires human confirmation and is unavailable in ask mode";

/// A single message's estimated token budget, above which the gateway
/// refuses to start a workflow at all (same `len() / 4` heuristic
/// `aurora-agent` already uses for its own budget accounting).
const MAX_SINGLE_MESSAGE_TOKENS: usize = 16_000;

#[derive(Clone)]
pub struct GatewayDeps {
    pub store: Arc<dyn Store>,
    pub secrets: Arc<SecretStore>,
    pub default_model: ModelConfig,
    pub providers: HashMap<String, ModelConfig>,
    pub agent_config: Arc<AgentConfig>,
    pub tools_config: ToolsConfig,
    pub event_channel_capacity: usize,
}

impl GatewayDeps {
    fn resolve_model(&self, requested: &str) -> ModelConfig {
        if let Some(cfg) = self.providers.get(requested) {
            return cfg.clone();
        }
        let mut cfg = self.default_model.clone();
        if !requested.is_empty() {
            cfg.name = requested.to_string();
        }
        cfg
    }
}

struct SessionHandle {
    agent: Mutex<Agent>,
    sender: Mutex<Option<mpsc::UnboundedSender<ServerMessage>>>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    confirmation_broker: Arc<ConfirmationBroker>,
}

/// Owns every live session and dispatches wire messages against them.
pub struct GatewayService {
    deps: GatewayDeps,
    sessions: DashMap<(Uuid, Uuid), Arc<SessionHandle>>,
}

impl GatewayService {
    pub fn new(deps: GatewayDeps) -> Arc<Self> {
        Arc::new(Self { deps, sessions: DashMap::new() })
    }

    /// Attaches `sender` as the outbound channel for `(tenant_id, session_id)`,
    /// replacing whatever connection previously held it. Used both on a
    /// brand-new session and on reconnect.
    async fn set_sender(&self, key: (Uuid, Uuid), sender: mpsc::UnboundedSender<ServerMessage>) {
        if let Some(handle) = self.sessions.get(&key) {
            *handle.sender.lock().await = Some(sender);
        }
    }

    /// Marks a connection as gone. The session keeps running in the
    /// background; a later reconnect re-attaches a fresh sender.
    pub async fn detach(&self, key: (Uuid, Uuid)) {
        if let Some(handle) = self.sessions.get(&key) {
            *handle.sender.lock().await = None;
        }
    }

    async fn send(&self, key: (Uuid, Uuid), msg: ServerMessage) {
        if let Some(handle) = self.sessions.get(&key) {
            let sender = handle.sender.lock().await;
            if let Some(tx) = sender.as_ref() {
                let _ = tx.send(msg);
            }
        }
    }

    async fn build_agent(&self, tenant_id: Uuid, requested_model: &str) -> anyhow::Result<(Agent, Arc<ConfirmationBroker>)> {
        let model_config = self.deps.resolve_model(requested_model);
        let model: Arc<dyn aurora_model::ModelProvider> = Arc::from(aurora_model::from_config(&model_config)?);
        let max_context_tokens = model.catalog_context_window().unwrap_or(128_000) as usize;
        let (_tool_event_tx, tool_event_rx) = mpsc::channel(1);
        let broker = Arc::new(ConfirmationBroker::new());
        let tools = crate::tools::build_registry(self.deps.secrets.clone(), tenant_id);
        let runtime = AgentRuntimeContext { tenant_id: Some(tenant_id), ..Default::default() };

        let agent = Agent::new(
            model,
            Arc::new(tools),
            self.deps.agent_config.clone(),
            runtime,
            Arc::new(Mutex::new(AgentMode::Agent)),
            tool_event_rx,
            max_context_tokens,
            ToolPolicy::from_config(&self.deps.tools_config),
            broker.clone(),
        );
        Ok((agent, broker))
    }

    /// Entry point called by the WebSocket handler for every parsed client
    /// frame. `on_connection` identifies the physical connection issuing the
    /// message, used only to key the outbound sender.
    pub async fn dispatch(
        self: &Arc<Self>,
        msg: ClientMessage,
        sender: &mpsc::UnboundedSender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Init { .. } => {
                // Stateless acknowledgement; sessions are created lazily by
                // the first `query` for a given session_id.
            }
            ClientMessage::Control { action: ControlAction::Cancel, session_id, user_id } => {
                self.handle_cancel((user_id, session_id)).await;
            }
            ClientMessage::ConfirmationResponse { confirmation_id, approved, user_id, session_id } => {
                self.handle_confirmation_response((user_id, session_id), &confirmation_id, approved)
                    .await;
            }
            ClientMessage::Query {
                query,
                user_id,
                session_id,
                model,
                mode,
                direct_tool_call,
                ..
            } => {
                self.handle_query((user_id, session_id), sender.clone(), query, model, mode, direct_tool_call)
                    .await;
            }
        }
    }

    async fn handle_cancel(&self, key: (Uuid, Uuid)) {
        if let Some(handle) = self.sessions.get(&key) {
            if let Some(tx) = handle.cancel.lock().await.take() {
                let _ = tx.send(());
            }
            handle.confirmation_broker.decline_all();
        }
    }

    async fn handle_confirmation_response(&self, key: (Uuid, Uuid), confirmation_id: &str, approved: bool) {
        if let Some(handle) = self.sessions.get(&key) {
            let decision = if approved { ConfirmationDecision::Approved } else { ConfirmationDecision::Declined };
            handle.confirmation_broker.resolve(confirmation_id, decision);
        }
    }

    async fn handle_query(
        self: &Arc<Self>,
        key: (Uuid, Uuid),
        sender: mpsc::UnboundedSender<ServerMessage>,
        query: String,
        model: String,
        mode: AgentMode,
        direct_tool_call: Option<crate::control::protocol::DirectToolCall>,
    ) {
        let (tenant_id, session_id) = key;

        if query.len() / 4 > MAX_SINGLE_MESSAGE_TOKENS {
            let _ = sender.send(ServerMessage::error(
                Some(session_id),
                "message exceeds the maximum single-turn size",
                Some("VALIDATION_ERROR"),
            ));
            return;
        }

        if !self.sessions.contains_key(&key) {
            match self.build_agent(tenant_id, &model).await {
                Ok((agent, broker)) => {
                    self.sessions.insert(
                        key,
                        Arc::new(SessionHandle {
                            agent: Mutex::new(agent),
                            sender: Mutex::new(None),
                            cancel: Mutex::new(None),
                            confirmation_broker: broker,
                        }),
                    );
                }
                Err(e) => {
                    let _ = sender.send(ServerMessage::error(
                        Some(session_id),
                        format!("model provider unavailable: {e}"),
                        Some("PROVIDER_UNAVAILABLE"),
                    ));
                    return;
                }
            }
        }
        self.set_sender(key, sender.clone()).await;

        let Some(handle) = self.sessions.get(&key).map(|h| h.clone()) else { return };

        let _ = sender.send(ServerMessage::Status {
            data: StatusData { status: SessionStatus::Start },
            session_id,
        });

        if let Some(call) = direct_tool_call {
            self.run_direct_tool_call(key, handle, call).await;
            self.send(key, ServerMessage::Status { data: StatusData { status: SessionStatus::End }, session_id })
                .await;
            return;
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *handle.cancel.lock().await = Some(cancel_tx);

        let (tx, mut rx) = mpsc::channel::<AgentEvent>(self.deps.event_channel_capacity.max(1));
        let svc = self.clone();
        let drain_key = key;
        let drain = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                svc.forward_event(drain_key, mode, event).await;
            }
        });

        let mut agent_guard = handle.agent.lock().await;
        let result = agent_guard.submit_with_cancel(&query, tx, cancel_rx).await;
        drop(agent_guard);
        let _ = drain.await;

        if let Err(e) = result {
            error!(session_id = %session_id, error = %e, "agent run failed");
            self.send(key, ServerMessage::error(Some(session_id), e.to_string(), None)).await;
        }
        self.send(key, ServerMessage::Status { data: StatusData { status: SessionStatus::End }, session_id })
            .await;
    }

    async fn run_direct_tool_call(&self, key: (Uuid, Uuid), handle: Arc<SessionHandle>, call: crate::control::protocol::DirectToolCall) {
        let (_, session_id) = key;
        let tool_call = ToolCall {
            id: Uuid::new_v4().to_string(),
            name: call.tool_name.clone(),
            args: call.parameters.clone(),
        };
        self.send(
            key,
            ServerMessage::ToolCall {
                data: ToolCallData {
                    tool_name: call.tool_name.clone(),
                    input: call.parameters,
                    status: "running",
                    timestamp: chrono::Utc::now(),
                    tool_call_id: tool_call.id.clone(),
                },
                session_id,
            },
        )
        .await;

        let output: ToolOutput = {
            let agent = handle.agent.lock().await;
            agent.tools().execute(&tool_call).await
        };
        let result = serde_json::json!({
            "ok": !output.is_error,
            "content": output.content,
        });
        self.send(
            key,
            ServerMessage::ToolResult {
                data: ToolResultData { tool_name: call.tool_name, result, session_id },
                session_id,
            },
        )
        .await;
    }

    async fn forward_event(self: &Arc<Self>, key: (Uuid, Uuid), mode: AgentMode, event: AgentEvent) {
        let (_, session_id) = key;
        match event {
            AgentEvent::TextDelta(text) => {
                self.send(
                    key,
                    ServerMessage::Message {
                        data: MessageData { text, is_chunk: true, streaming: true },
                        session_id,
                    },
                )
                .await;
            }
            AgentEvent::TextComplete(text) | AgentEvent::ThinkingComplete(text) => {
                self.send(
                    key,
                    ServerMessage::Message { data: MessageData { text, is_chunk: false, streaming: false }, session_id },
                )
                .await;
            }
            AgentEvent::ToolCallStarted(call) => {
                self.send(
                    key,
                    ServerMessage::ToolCall {
                        data: ToolCallData {
                            tool_name: call.name,
                            input: call.args,
                            status: "running",
                            timestamp: chrono::Utc::now(),
                            tool_call_id: call.id,
                        },
                        session_id,
                    },
                )
                .await;
            }
            AgentEvent::ToolCallFinished { tool_name, output, is_error, .. } => {
                let result = if is_error && mode == AgentMode::Ask && output.contains(ASK_MODE_DENIAL) {
                    serde_json::json!({ "error": true, "code": "READ_ONLY_MODE", "message": output })
                } else if is_error {
                    serde_json::json!({ "error": true, "message": output })
                } else {
                    serde_json::json!({ "ok": true, "content": output })
                };
                self.send(key, ServerMessage::ToolResult { data: ToolResultData { tool_name, result, session_id }, session_id })
                    .await;
            }
            AgentEvent::ConfirmationRequested { confirmation_id, tool_name, summary } => {
                self.send(
                    key,
                    ServerMessage::ConfirmationRequest {
                        data: ConfirmationRequestData { confirmation_id, tool_name, message: summary },
                        session_id,
                    },
                )
                .await;
            }
            AgentEvent::TokenUsage { .. } => {
                // `total_cost` is a model-catalog-priced figure outside this
                // crate's scope; surfaced as zero until a pricing table lands.
                self.send(key, ServerMessage::UsageInfo { data: crate::control::protocol::UsageInfoData { total_cost: 0.0 }, session_id })
                    .await;
            }
            AgentEvent::Error(message) => {
                warn!(session_id = %session_id, message, "agent reported a recoverable error");
                self.send(key, ServerMessage::error(Some(session_id), message, None)).await;
            }
            AgentEvent::Aborted { partial_text } => {
                if !partial_text.is_empty() {
                    self.send(
                        key,
                        ServerMessage::Message {
                            data: MessageData { text: partial_text, is_chunk: false, streaming: false },
                            session_id,
                        },
                    )
                    .await;
                }
            }
            AgentEvent::PlaceholderWarning(text) => {
                warn!(
                    session_id = %session_id,
                    chars = text.len(),
                    "assistant response contained an unresolved template placeholder"
                );
            }
            AgentEvent::ContextCompacted { .. } | AgentEvent::ModeChanged(_) | AgentEvent::TurnComplete => {}
        }
    }

    /// Persists a thought produced by a live session, mirroring
    /// `aurora-queue`'s background runner so manual and automatic RCA runs
    /// leave an identical audit trail. Called from the HTTP layer once it
    /// knows which incident, if any, this session is attached to.
    pub async fn persist_thought(&self, tenant_id: Uuid, incident_id: Uuid, content: String) {
        let _ = self
            .deps
            .store
            .add_thought(tenant_id, NewIncidentThought { incident_id, thought_type: "reasoning".into(), content })
            .await;
    }

    pub async fn persist_citation(&self, tenant_id: Uuid, incident_id: Uuid, call_id: String, tool_name: String, output: String) {
        let _ = self
            .deps
            .store
            .add_citation(tenant_id, NewIncidentCitation { incident_id, citation_key: call_id, tool_name, command: None, output })
            .await;
    }
}
