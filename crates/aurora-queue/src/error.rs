// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] aurora_store::StoreError),
    #[error(transparent)]
    Incident(#[from] aurora_incidents::IncidentError),
    #[error("model provider construction failed: {0}")]
    Model(#[from] anyhow::Error),
    #[error("agent run failed: {0}")]
    Agent(String),
}
