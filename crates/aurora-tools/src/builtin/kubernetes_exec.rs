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

/// Read-only subcommands that never mutate cluster state. Anything else
/// (delete, scale, rollout, cordon, exec into a container, ...) is treated
/// as mutating and defaults to requiring confirmation.
const READ_ONLY_SUBCOMMANDS: &[&str] = &["get", "describe", "logs", "top", "explain"];

/// Runs `kubectl` against a named context/namespace. Read subcommands
/// (get/describe/logs) are auto-approved by default policy config; anything
/// that mutates cluster state requires confirmation.
pub struct KubernetesExecTool {
    pub kubectl_path: String,
    pub timeout_secs: u64,
}

impl Default for KubernetesExecTool {
    fn default() -> Self {
        Self {
            kubectl_path: "kubectl".to_string(),
            timeout_secs: 30,
        }
    }
}

#[async_trait]
impl Tool for KubernetesExecTool {
    fn name(&self) -> &str {
        "kubernetes_exec"
    }

    fn description(&self) -> &str {
        "Run a kubectl subcommand against a cluster context. Read subcommands (get, describe, \
         logs, top, explain) execute immediately. Anything else — delete, scale, rollout \
         restart, cordon/drain, exec — is a mutating action and pauses for human confirmation \
         before running. Prefer this over aws_exec/gcp_exec for workload-level investigation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subcommand": {
                    "type": "string",
                    "description": "kubectl subcommand, e.g. get, describe, logs, delete, rollout"
                },
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Remaining arguments, e.g. [\"pod\", \"checkout-7f8\", \"-n\", \"prod\"]"
                },
                "context": {
                    "type": "string",
                    "description": "kubectl context to target (optional, uses current-context if omitted)"
                }
            },
            "required": ["subcommand", "args"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    // get/describe/logs/top/explain are read-only and stay available in
    // `Ask` mode; the per-call policy decision (not `modes()`) is what
    // actually blocks a mutating subcommand there. See `aurora_agent::Agent`'s
    // dispatch gate.
    fn output_category(&self) -> OutputCategory {
        OutputCategory::HeadTail
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(subcommand) = call.args.get("subcommand").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'subcommand'");
        };
        let args: Vec<String> = call
            .args
            .get("args")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let context = call.args.get("context").and_then(|v| v.as_str());

        debug!(subcommand, ?context, "kubernetes_exec tool");

        let mut cmd = Command::new(&self.kubectl_path);
        cmd.arg(subcommand);
        if let Some(ctx) = context {
            cmd.arg("--context").arg(ctx);
        }
        cmd.args(&args);
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

/// `true` if `subcommand` is in the read-only allowlist and never mutates
/// cluster state.
pub fn is_read_only_subcommand(subcommand: &str) -> bool {
    READ_ONLY_SUBCOMMANDS.contains(&subcommand)
}
