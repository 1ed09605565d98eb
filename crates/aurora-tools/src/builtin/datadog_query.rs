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

/// Queries the Datadog metrics API for a timeseries over a given window.
pub struct DatadogQueryTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for DatadogQueryTool {
    fn name(&self) -> &str {
        "datadog_query"
    }

    fn description(&self) -> &str {
        "Query a Datadog metric query string (e.g. `avg:trace.http.request.errors{service:checkout}`) \
         over a Unix epoch time range and return the points in the series."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Datadog metric query string"
                },
                "from": {
                    "type": "integer",
                    "description": "Range start, Unix epoch seconds"
                },
                "to": {
                    "type": "integer",
                    "description": "Range end, Unix epoch seconds"
                }
            },
            "required": ["query", "from", "to"],
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
        let Some(query) = call.args.get("query").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'query'");
        };
        let Some(from) = call.args.get("from").and_then(|v| v.as_i64()) else {
            return ToolOutput::err(&call.id, "missing 'from'");
        };
        let Some(to) = call.args.get("to").and_then(|v| v.as_i64()) else {
            return ToolOutput::err(&call.id, "missing 'to'");
        };

        debug!(query, from, to, "datadog_query tool");

        let url = format!("{}/api/v1/query", self.base_url);
        let from_s = from.to_string();
        let to_s = to.to_string();
        let params = [("query", query), ("from", from_s.as_str()), ("to", to_s.as_str())];

        match authorized_get(&self.secrets, self.tenant_id, "datadog/api_key", &url, &params, "DD-API-KEY").await {
            Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
            Err(e) => ToolOutput::err(&call.id, format!("datadog query failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> DatadogQueryTool {
        DatadogQueryTool {
            base_url: "http://127.0.0.1:1".to_string(),
            secrets: Arc::new(SecretStore::new(&aurora_config::SecretsConfig::default())),
            tenant_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn is_auto_approved() {
        assert_eq!(tool().default_policy(), ApprovalPolicy::Auto);
    }

    #[tokio::test]
    async fn missing_range_is_error() {
        let out = tool()
            .execute(&ToolCall {
                id: "1".into(),
                name: "datadog_query".into(),
                args: json!({"query": "avg:system.cpu.user{*}"}),
            })
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("from"));
    }
}
