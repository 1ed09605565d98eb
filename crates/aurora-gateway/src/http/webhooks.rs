// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Per-source webhook ingress.
//!
//! One route, `POST /webhooks/{tenant_id}/{source}`, accepts signed vendor
//! payloads for every supported source (PagerDuty, Grafana, Datadog,
//! Netdata, Splunk, Dynatrace, Jenkins). Signature verification is the
//! general HMAC-SHA256-over-`v0:<ts>:<body>` construction from
//! `crypto::webhook`; source-specific signature schemes beyond that general
//! shape are out of scope.
//!
//! A verified delivery is handed to `aurora_incidents::pipeline::ingest`;
//! incidents eligible for the background RCA workflow are scheduled onto
//! the queue. The endpoint always responds before the RCA workflow runs —
//! ingestion and correlation are synchronous, the agent run is not.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::http::AppState;

const SIGNATURE_HEADER: &str = "x-aurora-signature";
const TIMESTAMP_HEADER: &str = "x-aurora-timestamp";

pub async fn webhook_handler(
    State(state): State<AppState>,
    Path((tenant_id, source)): Path<(Uuid, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::UNAUTHORIZED, "missing signature header").into_response();
    };
    let Some(timestamp) = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
    else {
        return (StatusCode::UNAUTHORIZED, "missing or malformed timestamp header").into_response();
    };

    let secret = match state.secrets.get(tenant_id, &format!("webhooks/{source}")).await {
        Ok(s) => s,
        Err(e) => {
            warn!(tenant_id = %tenant_id, source, error = %e, "no webhook secret configured for source");
            return (StatusCode::UNAUTHORIZED, "unknown source or tenant").into_response();
        }
    };

    if let Err(e) = crate::crypto::webhook::verify(secret.as_bytes(), timestamp, &body, signature, chrono::Utc::now().timestamp()) {
        warn!(tenant_id = %tenant_id, source, error = %e, "webhook signature rejected");
        return (StatusCode::UNAUTHORIZED, "signature verification failed").into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("malformed JSON body: {e}")).into_response(),
    };

    let outcome = aurora_incidents::ingest(state.store.as_ref(), tenant_id, &source, &payload, &state.correlation).await;

    match outcome {
        Ok(Some(outcome)) => {
            if outcome.schedule_rca {
                state.queue.schedule_rca(tenant_id, outcome.incident_id, source.clone());
                state.queue.schedule_summary(tenant_id, outcome.incident_id);
            }
            info!(tenant_id = %tenant_id, source, incident_id = %outcome.incident_id, "webhook ingested");
            StatusCode::ACCEPTED.into_response()
        }
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            error!(tenant_id = %tenant_id, source, error = %e, "webhook ingestion failed");
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
        }
    }
}
