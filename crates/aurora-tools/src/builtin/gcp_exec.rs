// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::builtin::shell::head_tail_truncate;
use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const READ_ONLY_VERBS: &[&str] = &["describe", "list", "get"];

/// Runs the `gcloud` CLI (`gcloud <group> <verb> ...`) against a project.
/// Use `kubernetes_exec` instead for workload-level checks inside GKE —
/// reserve this for infrastructure-level operations (Compute Engine, Cloud
/// SQL, load balancers, managed instance groups).
pub struct GcpExecTool {
    pub gcloud_path: String,
    pub timeout_secs: u64,
}

impl Default for GcpExecTool {
    fn default() -> Self {
        Self {
            gcloud_path: "gcloud".to_string(),
            timeout_secs: 30,
        }
    }
}

#[async_trait]
impl Tool for GcpExecTool {
    fn name(&self) -> &str {
        "gcp_exec"
    }

    fn description(&self) -> &str {
        "Run a gcloud CLI command (`gcloud <group> <verb> [args...]`) against a project. \
         describe/list/get verbs execute immediately; anything that creates, updates, resets, \
         or deletes a resource is a mutating action and pauses for human confirmation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "group": { "type": "string", "description": "gcloud resource group, e.g. compute instances, sql instances" },
                "verb": { "type": "string", "description": "Verb, e.g. describe, reset, delete" },
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Remaining CLI arguments"
                },
                "project": { "type": "string", "description": "GCP project id (optional)" }
            },
            "required": ["group", "verb", "args"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    // describe/list/get verbs are read-only and stay available in `Ask` mode;
    // the per-call policy decision (not `modes()`) is what actually blocks a
    // mutating verb there. See `aurora_agent::Agent`'s dispatch gate.
    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(group) = call.args.get("group").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'group'");
        };
        let Some(verb) = call.args.get("verb").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'verb'");
        };
        let extra: Vec<String> = call
            .args
            .get("args")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        debug!(group, verb, "gcp_exec tool");

        let group_parts: Vec<&str> = group.split_whitespace().collect();
        let mut cmd = Command::new(&self.gcloud_path);
        cmd.args(&group_parts).arg(verb).args(&extra);
        if let Some(project) = call.args.get("project").and_then(|v| v.as_str()) {
            cmd.arg("--project").arg(project);
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut content = head_tail_truncate(&stdout);
                if !stderr.is_empty() {
                    content.push_str("\n[stderr]\n");
                    content.push_str(&head_tail_truncate(&stderr));
                }
                if output.status.success() {
                    ToolOutput::ok(&call.id, content)
                } else {
                    ToolOutput::err(&call.id, format!("[exit {}]\n{content}", output.status.code().unwrap_or(-1)))
                }
            }
            Ok(Err(e)) => ToolOutput::err(&call.id, format!("spawn error: {e}")),
            Err(_) => ToolOutput::err(&call.id, format!("timeout after {}s", self.timeout_secs)),
        }
    }
}

/// `true` if `verb` only reads state (describe/list/get) and never mutates
/// GCP resources.
pub fn is_read_only_verb(verb: &str) -> bool {
    READ_ONLY_VERBS.contains(&verb)
}
