// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Uniform error taxonomy for the live session gateway and webhook ingress.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authentication failed")]
    Auth,
    #[error(transparent)]
    Store(#[from] aurora_store::StoreError),
    #[error(transparent)]
    Incident(#[from] aurora_incidents::IncidentError),
    #[error(transparent)]
    Queue(#[from] aurora_queue::QueueError),
    #[error("model provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("agent run failed: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable machine-readable code surfaced in error frames / HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::Auth => "AUTH_ERROR",
            GatewayError::Store(_) | GatewayError::Incident(_) | GatewayError::Queue(_) => "INTERNAL",
            GatewayError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            GatewayError::Internal(_) => "INTERNAL",
        }
    }
}
