// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Wire protocol for the live session WebSocket.
//!
//! JSON over WebSocket text frames. Every server frame that applies to a
//! specific session carries `session_id` so a client juggling more than one
//! running incident investigation can demultiplex on its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use aurora_config::AgentMode;

#[derive(Debug, Clone, Deserialize)]
pub struct DirectToolCall {
    pub tool_name: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Init {
        user_id: Uuid,
    },
    Control {
        action: ControlAction,
        session_id: Uuid,
        user_id: Uuid,
    },
    ConfirmationResponse {
        confirmation_id: String,
        approved: bool,
        user_id: Uuid,
        session_id: Uuid,
    },
    Query {
        query: String,
        user_id: Uuid,
        session_id: Uuid,
        model: String,
        mode: AgentMode,
        #[serde(default)]
        provider_preference: Option<Vec<String>>,
        #[serde(default)]
        direct_tool_call: Option<DirectToolCall>,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Start,
    End,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status {
        data: StatusData,
        session_id: Uuid,
    },
    Message {
        data: MessageData,
        session_id: Uuid,
    },
    ToolCall {
        data: ToolCallData,
        session_id: Uuid,
    },
    ToolResult {
        data: ToolResultData,
        session_id: Uuid,
    },
    ConfirmationRequest {
        data: ConfirmationRequestData,
        session_id: Uuid,
    },
    UsageInfo {
        data: UsageInfoData,
        session_id: Uuid,
    },
    Error {
        data: ErrorData,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<Uuid>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageData {
    pub text: String,
    #[serde(default)]
    pub is_chunk: bool,
    #[serde(default)]
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallData {
    pub tool_name: String,
    pub input: Value,
    pub status: &'static str,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub tool_call_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResultData {
    pub tool_name: String,
    pub result: Value,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequestData {
    pub confirmation_id: String,
    pub tool_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageInfoData {
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl ServerMessage {
    pub fn error(session_id: Option<Uuid>, text: impl Into<String>, code: Option<&'static str>) -> Self {
        ServerMessage::Error {
            data: ErrorData { text: text.into(), code },
            session_id,
        }
    }
}
