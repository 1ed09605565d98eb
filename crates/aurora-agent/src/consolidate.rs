// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-of-turn message consolidation.
//!
//! The model stream can leave a session's message list in a state that is
//! individually correct per-event but inconsistent as a whole: a tool call
//! that arrived with no id gets a synthetic placeholder (`tc_synthetic_N`,
//! see `stream_one_turn`), and on a cancelled-then-resumed turn the same
//! logical call can be recorded twice under different ids. None of this is
//! visible until the full turn is assembled, so it is cleaned up once, here,
//! rather than at each streaming callback.
use std::collections::HashSet;

use aurora_model::{Message, MessageContent, Role};

/// Tokens that indicate the model answered with an unresolved template
/// value instead of a real identifier it should have looked up (a project
/// id, subscription id, account id, ...). Checked case-insensitively.
const PLACEHOLDER_TOKENS: &[&str] = &[
    "<project",
    "project-id",
    "your-project",
    "replace",
    "todo",
    "subscription id",
    "subscription-id",
    "account id",
];

/// A synthetic id minted for a tool call whose provider event carried no id.
fn is_placeholder_id(id: &str) -> bool {
    id.starts_with("tc_synthetic_")
}

/// Scan assistant text for placeholder tokens the model should have
/// resolved before answering. Used to nudge a follow-up turn rather than
/// let an incident response go out referencing `<project-id>` verbatim.
pub fn scan_for_placeholders(text: &str) -> bool {
    let lower = text.to_lowercase();
    PLACEHOLDER_TOKENS.iter().any(|tok| lower.contains(tok))
}

/// The most recently failed tool call in the session, if any — surfaced so
/// a cancellation or a stalled turn can tell the model (or the operator)
/// what broke instead of silently dropping the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailureSummary {
    pub tool_name: String,
    pub message: String,
    pub command: String,
}

/// Walk the session backward and return the last tool result whose payload
/// reports failure (`{"error": true, ...}`, `{"success": false, ...}`, or a
/// `"status": "failed"|"error"` field) — the most recent failure is what
/// matters for a continuation prompt, not the first one in the turn.
pub fn extract_last_tool_failure(messages: &[Message]) -> Option<ToolFailureSummary> {
    for (i, msg) in messages.iter().enumerate().rev() {
        let MessageContent::ToolResult { tool_call_id, content } = &msg.content else {
            continue;
        };
        let Some(text) = content.as_text() else { continue };
        let Ok(payload) = serde_json::from_str::<serde_json::Value>(text) else {
            continue;
        };
        let Some(obj) = payload.as_object() else { continue };

        let failed = matches!(
            obj.get("status").and_then(|v| v.as_str()),
            Some("failed") | Some("error")
        ) || obj.get("error").and_then(|v| v.as_bool()) == Some(true)
            || obj.get("success").and_then(|v| v.as_bool()) == Some(false);
        if !failed {
            continue;
        }

        let tool_name = obj
            .get("tool_name")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| tool_name_for_call(&messages[..i], tool_call_id))
            .unwrap_or_default();
        let message = obj
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string());
        let command = obj
            .get("final_command")
            .and_then(|v| v.as_str())
            .or_else(|| obj.get("command").and_then(|v| v.as_str()))
            .unwrap_or_default()
            .to_string();

        return Some(ToolFailureSummary { tool_name, message, command });
    }
    None
}

fn tool_name_for_call(preceding: &[Message], tool_call_id: &str) -> Option<String> {
    preceding.iter().rev().find_map(|m| match &m.content {
        MessageContent::ToolCall { tool_call_id: id, function } if id == tool_call_id => {
            Some(function.name.clone())
        }
        _ => None,
    })
}

/// Result of a consolidation pass, reported so the caller can log what
/// changed rather than silently rewriting history.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// Duplicate `ToolCall` messages sharing an id that were dropped.
    pub dropped_duplicate_calls: usize,
    /// Placeholder ids folded into the stable id emitted later for the same
    /// call (and every `ToolResult`/`ToolCall` referencing it rewritten).
    pub merged_placeholder_ids: usize,
    /// `ToolResult.tool_call_id` values that did not match any `ToolCall`
    /// message and were restored by positional matching.
    pub restored_tool_call_ids: usize,
}

impl ConsolidationReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Reconcile tool-call bookkeeping in `messages` in place, run once at the
/// end of a turn (and again, defensively, before persisting a cancelled
/// turn).
///
/// 1. **Dedup by id.** Two `ToolCall` messages can carry the same id after a
///    cancelled turn is resumed and replayed onto the same history; keep the
///    first occurrence — it is what the tools registry actually executed
///    against — and drop later duplicates.
/// 2. **Id-merge.** A placeholder id (`tc_synthetic_*`, minted when a
///    provider event arrived with an empty id) that sits immediately next to
///    a real id for a call with the same name is the same call observed
///    twice; fold the placeholder into the real id everywhere it appears.
/// 3. **Positional restoration.** If, after steps 1–2, the ordered list of
///    `ToolCall` ids and the ordered list of `ToolResult.tool_call_id`s are
///    the same length but differ in content (a result drifted from its
///    call), zip them positionally and overwrite the result's id to match.
///    Restoration is skipped — not guessed — when the counts disagree, since
///    a mismatch there means a call or result is genuinely missing, not
///    merely mislabeled.
pub fn consolidate_session(messages: &mut Vec<Message>) -> ConsolidationReport {
    let mut report = ConsolidationReport::default();

    let mut seen: HashSet<String> = HashSet::new();
    messages.retain(|msg| {
        if let MessageContent::ToolCall { tool_call_id, .. } = &msg.content {
            if !seen.insert(tool_call_id.clone()) {
                report.dropped_duplicate_calls += 1;
                return false;
            }
        }
        true
    });

    report.merged_placeholder_ids = merge_placeholder_ids(messages);
    report.restored_tool_call_ids = restore_tool_call_ids(messages);
    report
}

/// Fold a placeholder id into the real id of its neighboring call of the
/// same name, rewriting every `ToolCall`/`ToolResult` message that
/// references it. Returns how many messages were rewritten.
fn merge_placeholder_ids(messages: &mut [Message]) -> usize {
    let call_names: Vec<(String, String)> = messages
        .iter()
        .filter_map(|m| match &m.content {
            MessageContent::ToolCall { tool_call_id, function } => {
                Some((tool_call_id.clone(), function.name.clone()))
            }
            _ => None,
        })
        .collect();

    let mut rewrites: Vec<(String, String)> = Vec::new();
    for pair in call_names.windows(2) {
        let (id_a, name_a) = &pair[0];
        let (id_b, name_b) = &pair[1];
        if name_a != name_b {
            continue;
        }
        match (is_placeholder_id(id_a), is_placeholder_id(id_b)) {
            (true, false) => rewrites.push((id_a.clone(), id_b.clone())),
            (false, true) => rewrites.push((id_b.clone(), id_a.clone())),
            _ => {}
        }
    }
    if rewrites.is_empty() {
        return 0;
    }

    let mut rewritten = 0usize;
    for msg in messages.iter_mut() {
        let id = match &mut msg.content {
            MessageContent::ToolCall { tool_call_id, .. } => tool_call_id,
            MessageContent::ToolResult { tool_call_id, .. } => tool_call_id,
            _ => continue,
        };
        if let Some((_, real)) = rewrites.iter().find(|(placeholder, _)| placeholder == id) {
            *id = real.clone();
            rewritten += 1;
        }
    }
    rewritten
}

/// When the ordered `ToolCall` ids and `ToolResult` ids are the same length
/// but drifted apart, restore the result ids positionally. Returns how many
/// were corrected.
fn restore_tool_call_ids(messages: &mut [Message]) -> usize {
    let ordered_call_ids: Vec<String> = messages
        .iter()
        .filter_map(|m| match &m.content {
            MessageContent::ToolCall { tool_call_id, .. } => Some(tool_call_id.clone()),
            _ => None,
        })
        .collect();
    let result_indices: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter_map(|(i, m)| matches!(m.content, MessageContent::ToolResult { .. }).then_some(i))
        .collect();

    if ordered_call_ids.len() != result_indices.len() {
        return 0;
    }

    let mut restored = 0usize;
    for (idx, expected_id) in result_indices.iter().zip(ordered_call_ids.iter()) {
        if let MessageContent::ToolResult { tool_call_id, .. } = &mut messages[*idx].content {
            if tool_call_id != expected_id {
                *tool_call_id = expected_id.clone();
                restored += 1;
            }
        }
    }
    restored
}

/// Append a synthetic notice to the persisted (but not streamed) context
/// after a cancelled turn, so the next turn's model call knows the run was
/// interrupted rather than simply ending. Mirrors the shape of a tool
/// failure message: plain user-role text, never shown to the person who hit
/// cancel.
pub fn urgent_cancellation_message(partial_text: &str, failure: Option<&ToolFailureSummary>) -> Message {
    let mut text = String::from(
        "[URGENT CANCELLATION] The user cancelled this turn before it finished. \
         Do not continue the previous action without being asked again.",
    );
    if !partial_text.is_empty() {
        text.push_str("\nPartial response before cancellation: ");
        text.push_str(partial_text);
    }
    if let Some(f) = failure {
        text.push_str(&format!(
            "\nThe last in-flight tool call ({}) had not yet finished: {}",
            f.tool_name, f.message
        ));
    }
    Message { role: Role::User, content: MessageContent::Text(text) }
}
