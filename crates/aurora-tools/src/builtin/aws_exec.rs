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

/// AWS CLI service verbs that only describe/list/get state.
const READ_ONLY_VERBS: &[&str] = &["describe", "list", "get", "head"];

/// Runs the AWS CLI (`aws <service> <verb> ...`) against an account/region.
/// Use `kubernetes_exec` instead for workload-level checks inside EKS —
/// reserve this for infrastructure-level operations (EC2, RDS, ELB, ASG).
pub struct AwsExecTool {
    pub aws_cli_path: String,
    pub timeout_secs: u64,
}

impl Default for AwsExecTool {
    fn default() -> Self {
        Self {
            aws_cli_path: "aws".to_string(),
            timeout_secs: 30,
        }
    }
}

#[async_trait]
impl Tool for AwsExecTool {
    fn name(&self) -> &str {
        "aws_exec"
    }

    fn description(&self) -> &str {
        "Run an AWS CLI command (`aws <service> <verb> [args...]`) against a region/profile. \
         describe/list/get/head verbs execute immediately; anything that creates, modifies, \
         terminates, or deletes a resource is a mutating action and pauses for human \
         confirmation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "service": { "type": "string", "description": "AWS CLI service, e.g. ec2, rds, elbv2, autoscaling" },
                "verb": { "type": "string", "description": "Service verb, e.g. describe-instances, terminate-instances" },
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Remaining CLI arguments"
                },
                "region": { "type": "string", "description": "AWS region (optional)" },
                "profile": { "type": "string", "description": "AWS CLI profile (optional)" }
            },
            "required": ["service", "verb", "args"],
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
        let Some(service) = call.args.get("service").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'service'");
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

        debug!(service, verb, "aws_exec tool");

        let mut cmd = Command::new(&self.aws_cli_path);
        cmd.arg(service).arg(verb).args(&extra);
        if let Some(region) = call.args.get("region").and_then(|v| v.as_str()) {
            cmd.arg("--region").arg(region);
        }
        if let Some(profile) = call.args.get("profile").and_then(|v| v.as_str()) {
            cmd.arg("--profile").arg(profile);
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

/// `true` if `verb` only reads state (describe/list/get/head) and never
/// mutates AWS resources.
pub fn is_read_only_verb(verb: &str) -> bool {
    READ_ONLY_VERBS.iter().any(|p| verb.starts_with(p))
}
