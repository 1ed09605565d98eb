// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use aurora_config::AgentMode;
use aurora_tools::ToolCall;

/// Which compaction path was taken for a given `ContextCompacted` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionStrategyUsed {
    /// Rolling LLM summarization producing a structured digest.
    Structured,
    /// Rolling LLM summarization producing a prose narrative.
    Narrative,
    /// Old messages dropped without a model call (compaction itself would
    /// have overflowed the budget).
    Emergency,
}

/// Events emitted by the agent during a single run.
/// Consumers (the live session gateway, the queue worker) subscribe to these
/// to drive their output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model
    TextDelta(String),
    /// A complete text response from the model (after streaming finishes)
    TextComplete(String),
    /// A thinking/reasoning chunk from the model (extended thinking API).
    ThinkingDelta(String),
    /// A complete thinking/reasoning block (accumulated from ThinkingDelta events).
    ThinkingComplete(String),
    /// The model has requested a tool call
    ToolCallStarted(ToolCall),
    /// A tool call finished
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// Context was compacted; statistics for the UI
    ContextCompacted {
        tokens_before: usize,
        tokens_after: usize,
        strategy: CompactionStrategyUsed,
        turn: u32,
    },
    /// Current token usage update
    TokenUsage {
        input: u32,
        output: u32,
        cache_read: u32,
        cache_write: u32,
        cache_read_total: u64,
        cache_write_total: u64,
        max_tokens: usize,
    },
    /// The agent has finished processing the current turn
    TurnComplete,
    /// The run was cancelled mid-stream. `partial_text` holds whatever text
    /// had already streamed before the cancellation took effect.
    Aborted { partial_text: String },
    /// A recoverable error occurred
    Error(String),
    /// The agent mode was changed mid-run (e.g. via the confirmation broker
    /// rejecting a tool in `Ask` mode and the operator switching to `Agent`).
    ModeChanged(AgentMode),
    /// A tool call requires human sign-off before it runs. The live session
    /// transport surfaces this to the reviewing engineer; the run is blocked
    /// on `confirmation_id` until the broker resolves it.
    ConfirmationRequested {
        confirmation_id: String,
        tool_name: String,
        summary: String,
    },
    /// The assistant's final text for this turn still contains an
    /// unresolved template placeholder (e.g. `<project-id>`) that it should
    /// have looked up before answering.
    PlaceholderWarning(String),
}
