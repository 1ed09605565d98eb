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

/// Read-only access to a Bitbucket repository: file contents at a ref, or
/// the commit log for a path. Used to correlate a recent deploy with an
/// incident's onset.
pub struct BitbucketReadTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for BitbucketReadTool {
    fn name(&self) -> &str {
        "bitbucket_read"
    }

    fn description(&self) -> &str {
        "Read a file's contents at a given ref, or list recent commits for a path, in a \
         Bitbucket repository. Read-only — does not support pushing, merging, or commenting."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "workspace": { "type": "string", "description": "Bitbucket workspace slug" },
                "repo_slug": { "type": "string", "description": "Repository slug" },
                "action": {
                    "type": "string",
                    "enum": ["read_file", "commits"],
                    "description": "read_file returns file contents; commits lists recent commit history"
                },
                "ref_or_path": {
                    "type": "string",
                    "description": "For read_file: 'ref/path/to/file'. For commits: the path to filter by (optional)."
                }
            },
            "required": ["workspace", "repo_slug", "action"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(workspace) = call.args.get("workspace").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'workspace'");
        };
        let Some(repo_slug) = call.args.get("repo_slug").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'repo_slug'");
        };
        let Some(action) = call.args.get("action").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'action'");
        };
        let ref_or_path = call.args.get("ref_or_path").and_then(|v| v.as_str()).unwrap_or("");

        debug!(workspace, repo_slug, action, "bitbucket_read tool");

        let url = match action {
            "read_file" => {
                if ref_or_path.is_empty() {
                    return ToolOutput::err(&call.id, "'ref_or_path' is required for read_file");
                }
                format!("{}/2.0/repositories/{}/{}/src/{}", self.base_url, workspace, repo_slug, ref_or_path)
            }
            "commits" => format!(
                "{}/2.0/repositories/{}/{}/commits{}",
                self.base_url,
                workspace,
                repo_slug,
                if ref_or_path.is_empty() { String::new() } else { format!("?path={ref_or_path}") }
            ),
            other => return ToolOutput::err(&call.id, format!("unknown action '{other}'")),
        };

        match authorized_get(&self.secrets, self.tenant_id, "bitbucket/app_password", &url, &[], "Authorization").await {
            Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
            Err(e) => ToolOutput::err(&call.id, format!("bitbucket_read failed: {e}")),
        }
    }
}
