// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Turns raw alert webhooks into correlated incidents.
//!
//! [`normalize`] maps a source-specific payload into a [`normalize::NormalizedAlert`],
//! [`correlate`] decides whether it belongs to an already-open incident, and
//! [`ingest`] wires the two together with the persistence layer for one
//! webhook delivery. [`merge`] handles the user-triggered manual merge path.

pub mod correlator;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod pipeline;

pub use correlator::{correlate, title_fingerprint, CorrelationResult};
pub use error::IncidentError;
pub use merge::{merge as merge_incidents, ContextUpdate, MergeOutcome};
pub use normalize::{normalize, NormalizedAlert};
pub use pipeline::{ingest, IngestOutcome};
