// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agent;
mod compact;
mod consolidate;
mod events;
mod prompts;
mod runtime_context;
mod session;

pub use agent::Agent;
pub use compact::{
    compact_session, compact_session_with_strategy, emergency_compact, smart_truncate,
};
pub use consolidate::{
    consolidate_session, extract_last_tool_failure, scan_for_placeholders,
    urgent_cancellation_message, ConsolidationReport, ToolFailureSummary,
};
pub use events::{AgentEvent, CompactionStrategyUsed};
pub use prompts::system_prompt;
pub use runtime_context::AgentRuntimeContext;
pub use session::{Session, TurnRecord};
