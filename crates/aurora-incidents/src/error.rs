// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncidentError {
    #[error("unsupported source type: {0}")]
    UnsupportedSource(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("merge would create a cycle (incident {0} is already an ancestor)")]
    MergeCycle(uuid::Uuid),
    #[error(transparent)]
    Store(#[from] aurora_store::StoreError),
}
