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

/// Queries a Grafana datasource (typically Prometheus or Loki proxied
/// through Grafana) for a metric or log range relevant to an incident.
pub struct GrafanaQueryTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for GrafanaQueryTool {
    fn name(&self) -> &str {
        "grafana_query"
    }

    fn description(&self) -> &str {
        "Run a PromQL or LogQL expression against a Grafana-proxied datasource and return the \
         raw result range. Use this to pull error rates, latency percentiles, saturation \
         metrics, or log excerpts for the affected service and time window."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expr": {
                    "type": "string",
                    "description": "PromQL or LogQL expression to evaluate"
                },
                "datasource_uid": {
                    "type": "string",
                    "description": "UID of the Grafana datasource to query"
                },
                "start": {
                    "type": "string",
                    "description": "Range start, RFC3339 or Grafana relative time (e.g. now-1h)"
                },
                "end": {
                    "type": "string",
                    "description": "Range end, RFC3339 or Grafana relative time (e.g. now)"
                }
            },
            "required": ["expr", "datasource_uid", "start", "end"],
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
        let Some(expr) = call.args.get("expr").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'expr'");
        };
        let Some(datasource_uid) = call.args.get("datasource_uid").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'datasource_uid'");
        };
        let start = call.args.get("start").and_then(|v| v.as_str()).unwrap_or("now-1h");
        let end = call.args.get("end").and_then(|v| v.as_str()).unwrap_or("now");

        debug!(expr, datasource_uid, "grafana_query tool");

        let url = format!("{}/api/datasources/proxy/uid/{}/query_range", self.base_url, datasource_uid);
        let query = [("query", expr), ("start", start), ("end", end)];

        match authorized_get(&self.secrets, self.tenant_id, "grafana/api_key", &url, &query, "Authorization").await {
            Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
            Err(e) => ToolOutput::err(&call.id, format!("grafana query failed: {e}")),
        }
    }
}
