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

/// Queries Dynatrace's metrics v2 API for a metric selector over a time
/// window, and can also be used to fetch a Davis problem's details.
pub struct DynatraceQueryTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for DynatraceQueryTool {
    fn name(&self) -> &str {
        "dynatrace_query"
    }

    fn description(&self) -> &str {
        "Query a Dynatrace metric selector (e.g. `builtin:service.errors.total.rate`) over a \
         relative time window, or fetch a specific Davis problem by id."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "metric_selector": {
                    "type": "string",
                    "description": "Dynatrace metric selector"
                },
                "problem_id": {
                    "type": "string",
                    "description": "Optional Davis problem id to fetch instead of a metric"
                },
                "relative_time": {
                    "type": "string",
                    "description": "Dynatrace relative timeframe, e.g. 'now-1h'"
                }
            },
            "required": ["relative_time"],
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
        let relative_time = match call.args.get("relative_time").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => return ToolOutput::err(&call.id, "missing 'relative_time'"),
        };
        let problem_id = call.args.get("problem_id").and_then(|v| v.as_str());
        let metric_selector = call.args.get("metric_selector").and_then(|v| v.as_str());

        if problem_id.is_none() && metric_selector.is_none() {
            return ToolOutput::err(&call.id, "provide either 'metric_selector' or 'problem_id'");
        }

        debug!(?problem_id, ?metric_selector, relative_time, "dynatrace_query tool");

        let (url, params): (String, Vec<(&str, &str)>) = if let Some(pid) = problem_id {
            (format!("{}/api/v2/problems/{}", self.base_url, pid), vec![])
        } else {
            (
                format!("{}/api/v2/metrics/query", self.base_url),
                vec![("metricSelector", metric_selector.unwrap()), ("from", relative_time)],
            )
        };

        match authorized_get(&self.secrets, self.tenant_id, "dynatrace/api_token", &url, &params, "Authorization").await {
            Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
            Err(e) => ToolOutput::err(&call.id, format!("dynatrace query failed: {e}")),
        }
    }
}
