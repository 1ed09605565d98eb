// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use aurora_secrets::SecretStore;

use crate::builtin::query_support::{authorized_get, pretty};
use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Runs a Splunk search over a time range via the REST search/jobs/export
/// endpoint and returns the result set.
pub struct SplunkSearchTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for SplunkSearchTool {
    fn name(&self) -> &str {
        "splunk_search"
    }

    fn description(&self) -> &str {
        "Run a Splunk search query (SPL) over a relative time range and return matching events. \
         Use this to pull application log lines that correlate with the incident's timeline."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "spl": {
                    "type": "string",
                    "description": "SPL search string, e.g. `search index=prod service=checkout ERROR`"
                },
                "earliest": {
                    "type": "string",
                    "description": "Splunk relative time for range start, e.g. -1h"
                },
                "latest": {
                    "type": "string",
                    "description": "Splunk relative time for range end, e.g. now"
                }
            },
            "required": ["spl", "earliest", "latest"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(spl) = call.args.get("spl").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'spl'");
        };
        let earliest = call.args.get("earliest").and_then(|v| v.as_str()).unwrap_or("-1h");
        let latest = call.args.get("latest").and_then(|v| v.as_str()).unwrap_or("now");

        debug!(spl, earliest, latest, "splunk_search tool");

        let url = format!("{}/services/search/jobs/export", self.base_url);
        let params = [
            ("search", spl),
            ("earliest_time", earliest),
            ("latest_time", latest),
            ("output_mode", "json"),
        ];

        match authorized_get(&self.secrets, self.tenant_id, "splunk/token", &url, &params, "Authorization").await {
            Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
            Err(e) => ToolOutput::err(&call.id, format!("splunk search failed: {e}")),
        }
    }
}
