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

/// Queries a Netdata agent/parent's `/api/v1/data` endpoint for a host-level
/// chart (CPU, memory, disk I/O, network) over a time window.
pub struct NetdataQueryTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for NetdataQueryTool {
    fn name(&self) -> &str {
        "netdata_query"
    }

    fn description(&self) -> &str {
        "Fetch a Netdata chart's data points for a host over a relative time window \
         (e.g. chart `system.cpu` on host `checkout-prod-3` for the last 900 seconds). \
         Useful for host-level saturation checks that application metrics don't surface."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "host": {
                    "type": "string",
                    "description": "Netdata host/node name"
                },
                "chart": {
                    "type": "string",
                    "description": "Chart id, e.g. system.cpu, system.ram, disk_io.sda"
                },
                "after_secs": {
                    "type": "integer",
                    "description": "Negative seconds relative to now marking the window start (e.g. -900)"
                }
            },
            "required": ["host", "chart", "after_secs"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(host) = call.args.get("host").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'host'");
        };
        let Some(chart) = call.args.get("chart").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'chart'");
        };
        let after = call.args.get("after_secs").and_then(|v| v.as_i64()).unwrap_or(-900);

        debug!(host, chart, after, "netdata_query tool");

        let url = format!("{}/host/{}/api/v1/data", self.base_url, host);
        let after_s = after.to_string();
        let params = [("chart", chart), ("after", after_s.as_str())];

        match authorized_get(&self.secrets, self.tenant_id, "netdata/api_token", &url, &params, "X-Netdata-Auth").await {
            Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
            Err(e) => ToolOutput::err(&call.id, format!("netdata query failed: {e}")),
        }
    }
}
