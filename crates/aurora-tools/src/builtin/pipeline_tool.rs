// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use aurora_secrets::SecretStore;

use crate::builtin::query_support::{authorized_get, pretty};
use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

/// Reads Jenkins job/build status, or triggers a build. Triggering is a
/// mutating action (it can kick off a rollback or redeploy pipeline) and
/// defaults to requiring confirmation; status reads do not.
pub struct PipelineTool {
    pub base_url: String,
    pub secrets: Arc<SecretStore>,
    pub tenant_id: Uuid,
}

#[async_trait]
impl Tool for PipelineTool {
    fn name(&self) -> &str {
        "pipeline_tool"
    }

    fn description(&self) -> &str {
        "Inspect a Jenkins job's recent build status (action=status), or trigger a new build \
         (action=trigger). Triggering a pipeline is a mutating action and pauses for human \
         confirmation — use it to kick off a rollback or redeploy job, not to check state."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "job_name": { "type": "string", "description": "Jenkins job name" },
                "action": {
                    "type": "string",
                    "enum": ["status", "trigger"],
                    "description": "status reads the last builds; trigger starts a new build"
                },
                "parameters": {
                    "type": "object",
                    "description": "Build parameters to pass when action=trigger"
                }
            },
            "required": ["job_name", "action"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(job_name) = call.args.get("job_name").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'job_name'");
        };
        let Some(action) = call.args.get("action").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'action'");
        };

        debug!(job_name, action, "pipeline_tool");

        match action {
            "status" => {
                let url = format!("{}/job/{}/api/json", self.base_url, job_name);
                match authorized_get(&self.secrets, self.tenant_id, "jenkins/api_token", &url, &[], "Authorization").await {
                    Ok(body) => ToolOutput::ok(&call.id, pretty(body)),
                    Err(e) => ToolOutput::err(&call.id, format!("pipeline status failed: {e}")),
                }
            }
            "trigger" => match self.trigger_build(job_name, call.args.get("parameters")).await {
                Ok(body) => ToolOutput::ok(&call.id, body),
                Err(e) => ToolOutput::err(&call.id, format!("pipeline trigger failed: {e}")),
            },
            other => ToolOutput::err(&call.id, format!("unknown action '{other}'")),
        }
    }
}

impl PipelineTool {
    async fn trigger_build(&self, job_name: &str, params: Option<&Value>) -> anyhow::Result<String> {
        let token = self.secrets.get(self.tenant_id, "jenkins/api_token").await?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let has_params = params.and_then(|p| p.as_object()).map(|o| !o.is_empty()).unwrap_or(false);
        let url = if has_params {
            format!("{}/job/{}/buildWithParameters", self.base_url, job_name)
        } else {
            format!("{}/job/{}/build", self.base_url, job_name)
        };

        let mut req = client.post(&url).header("Authorization", token);
        if let Some(obj) = params.and_then(|p| p.as_object()) {
            let form: Vec<(String, String)> = obj
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
                .collect();
            req = req.form(&form);
        }

        let resp = req.send().await?.error_for_status()?;
        let queue_location = resp
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        Ok(format!("build queued: {queue_location}"))
    }
}
