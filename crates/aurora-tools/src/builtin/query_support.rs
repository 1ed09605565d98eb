// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared plumbing for the read-only observability query tools
//! (`grafana_query`, `datadog_query`, `netdata_query`, `splunk_search`,
//! `dynatrace_query`). Each tool owns its own parameter schema and response
//! shaping, but they all authenticate the same way: a bearer credential
//! fetched from the tenant's secret store and attached to a GET request.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use aurora_secrets::SecretStore;

/// Issue an authenticated GET request against a query backend and return the
/// response body as text. `secret_key` identifies the credential under this
/// tenant (e.g. `"datadog/api_key"`).
pub(crate) async fn authorized_get(
    secrets: &SecretStore,
    tenant_id: Uuid,
    secret_key: &str,
    url: &str,
    query: &[(&str, &str)],
    auth_header: &str,
) -> anyhow::Result<String> {
    let token = secrets.get(tenant_id, secret_key).await?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let resp = client
        .get(url)
        .query(query)
        .header(auth_header, token)
        .send()
        .await?
        .error_for_status()?;

    Ok(resp.text().await?)
}

/// Best-effort pretty-print: if the body parses as JSON, re-serialize it
/// indented; otherwise return it unchanged. Keeps tool output readable
/// without requiring every backend's response to be modeled as a type.
pub(crate) fn pretty(body: String) -> String {
    match serde_json::from_str::<Value>(&body) {
        Ok(v) => serde_json::to_string_pretty(&v).unwrap_or(body),
        Err(_) => body,
    }
}
