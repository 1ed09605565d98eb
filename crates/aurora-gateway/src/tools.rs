// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Builds a tool registry for one agent run.
//!
//! Several built-in tools carry `base_url`/`secrets`/`tenant_id` as
//! construction-time fields rather than call-time parameters, so the
//! registry is assembled fresh per run instead of being a single
//! process-wide singleton. Base URLs come from the environment — per-tenant
//! endpoint configuration is out of scope here.

use std::sync::Arc;

use aurora_secrets::SecretStore;
use aurora_tools::{
    AwsExecTool, BitbucketReadTool, ConfluenceSearchTool, DatadogQueryTool, DynatraceQueryTool,
    GcpExecTool, GrafanaQueryTool, KubernetesExecTool, NetdataQueryTool, PipelineTool, ShellTool,
    SplunkSearchTool, ToolRegistry, WebFetchTool,
};
use uuid::Uuid;

fn env_base_url(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Full catalog used by an incident-investigation agent run.
pub fn build_registry(secrets: Arc<SecretStore>, tenant_id: Uuid) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(DatadogQueryTool {
        base_url: env_base_url("AURORA_DATADOG_BASE_URL", "https://api.datadoghq.com"),
        secrets: secrets.clone(),
        tenant_id,
    });
    registry.register(DynatraceQueryTool {
        base_url: env_base_url("AURORA_DYNATRACE_BASE_URL", "https://api.dynatrace.com"),
        secrets: secrets.clone(),
        tenant_id,
    });
    registry.register(GrafanaQueryTool {
        base_url: env_base_url("AURORA_GRAFANA_BASE_URL", "http://grafana.internal"),
        secrets: secrets.clone(),
        tenant_id,
    });
    registry.register(NetdataQueryTool {
        base_url: env_base_url("AURORA_NETDATA_BASE_URL", "http://netdata.internal"),
        secrets: secrets.clone(),
        tenant_id,
    });
    registry.register(SplunkSearchTool {
        base_url: env_base_url("AURORA_SPLUNK_BASE_URL", "https://splunk.internal:8089"),
        secrets: secrets.clone(),
        tenant_id,
    });
    registry.register(ConfluenceSearchTool {
        base_url: env_base_url("AURORA_CONFLUENCE_BASE_URL", "https://confluence.internal"),
        secrets: secrets.clone(),
        tenant_id,
    });
    registry.register(BitbucketReadTool {
        base_url: env_base_url("AURORA_BITBUCKET_BASE_URL", "https://bitbucket.internal"),
        secrets: secrets.clone(),
        tenant_id,
    });
    registry.register(PipelineTool {
        base_url: env_base_url("AURORA_JENKINS_BASE_URL", "https://jenkins.internal"),
        secrets,
        tenant_id,
    });

    registry.register(AwsExecTool::default());
    registry.register(GcpExecTool::default());
    registry.register(KubernetesExecTool::default());
    registry.register(ShellTool::default());
    registry.register(WebFetchTool);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_the_full_representative_catalog() {
        let secrets = Arc::new(SecretStore::new(&aurora_config::SecretsConfig::default()));
        let registry = build_registry(secrets, Uuid::new_v4());
        let names = registry.names();
        for expected in [
            "datadog_query",
            "dynatrace_query",
            "grafana_query",
            "netdata_query",
            "splunk_search",
            "confluence_search",
            "bitbucket_read",
            "pipeline_tool",
            "aws_exec",
            "gcp_exec",
            "kubernetes_exec",
            "shell",
            "web_fetch",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing tool: {expected}");
        }
    }
}
