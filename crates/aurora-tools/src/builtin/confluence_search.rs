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

/// Full-text search over a Confluence space for existing runbooks, postmortems,
/// or architecture docs relevant to the incident.
pub struct ConfluenceSearchTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for ConfluenceSearchTool {
    fn name(&self) -> &str {
        "confluence_search"
    }

    fn description(&self) -> &str {
        "Search Confluence (CQL-backed full text search) for runbooks, postmortems, or \
         architecture pages matching a query. Always check for an existing runbook before \
         improvising a remediation for an unfamiliar service."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text search query, e.g. 'checkout service runbook'"
                },
                "space_key": {
                    "type": "string",
                    "description": "Optional Confluence space key to restrict the search to"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results to return (default 10)"
                }
            },
            "required": ["query"],
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
        let Some(query) = call.args.get("query").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'query'");
        };
        let space_key = call.args.get("space_key").and_then(|v| v.as_str());
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).unwrap_or(10);

        debug!(query, ?space_key, limit, "confluence_search tool");

        let cql = match space_key {
            Some(space) => format!("text ~ \"{query}\" AND space = \"{space}\""),
            None => format!("text ~ \"{query}\""),
        };
        let url = format!("{}/rest/api/content/search", self.base_url);
        let limit_s = limit.to_string();
        let params = [("cql", cql.as_str()), ("limit", limit_s.as_str())];

        match authorized_get(&self.secrets, self.tenant_id, "confluence/token", &url, &params, "Authorization").await {
            Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
            Err(e) => ToolOutput::err(&call.id, format!("confluence search failed: {e}")),
        }
    }
}
