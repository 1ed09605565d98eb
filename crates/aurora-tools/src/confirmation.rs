// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Process-wide registry of outstanding human-confirmation requests.
//!
//! A tool whose [`crate::policy::ApprovalPolicy`] resolves to `Ask` does not
//! execute directly. It registers a [`ConfirmationRequest`] here, emits
//! [`crate::events::ToolEvent::AwaitingConfirmation`] so the live session
//! transport can surface it, and then awaits the paired receiver. The
//! transport resolves the request once the reviewing engineer approves or
//! declines it. Each id is single-use: resolving it twice is a no-op for the
//! second caller.

use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Approved,
    Declined,
}

/// A tool call awaiting human sign-off.
pub struct ConfirmationRequest {
    pub confirmation_id: String,
    pub tool_name: String,
    /// Human-readable description of the action about to be taken, shown in
    /// the confirmation prompt (e.g. "restart deployment checkout in
    /// production").
    pub summary: String,
    pub receiver: oneshot::Receiver<ConfirmationDecision>,
}

/// Registry mapping confirmation ids to the sender half of their resolution
/// channel. Shared across an agent run (and, for the gateway, across all
/// runs in a process) behind an `Arc`.
#[derive(Default)]
pub struct ConfirmationBroker {
    pending: DashMap<String, oneshot::Sender<ConfirmationDecision>>,
}

impl ConfirmationBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new confirmation request, returning it paired with a fresh
    /// id. The tool awaits `request.receiver` after emitting the
    /// `AwaitingConfirmation` event.
    pub fn register(&self, tool_name: impl Into<String>, summary: impl Into<String>) -> ConfirmationRequest {
        let confirmation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(confirmation_id.clone(), tx);
        ConfirmationRequest {
            confirmation_id,
            tool_name: tool_name.into(),
            summary: summary.into(),
            receiver: rx,
        }
    }

    /// Resolve a pending confirmation. Returns `true` if a waiting tool call
    /// was actually woken, `false` if the id was unknown or already resolved
    /// (stale client retry, duplicate click).
    pub fn resolve(&self, confirmation_id: &str, decision: ConfirmationDecision) -> bool {
        match self.pending.remove(confirmation_id) {
            Some((_, tx)) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Number of confirmations currently awaiting a decision. Exposed for
    /// session teardown: a run that ends with pending confirmations should
    /// decline them rather than leak the channel.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Decline every confirmation still pending. Called when a run is
    /// cancelled or the session disconnects.
    pub fn decline_all(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.resolve(&id, ConfirmationDecision::Declined);
        }
    }
}
