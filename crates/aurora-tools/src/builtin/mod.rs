// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod aws_exec;
pub mod bitbucket_read;
pub mod confluence_search;
pub mod datadog_query;
pub mod dynatrace_query;
pub mod gcp_exec;
pub mod grafana_query;
pub mod kubernetes_exec;
pub mod netdata_query;
pub mod pipeline_tool;
pub mod splunk_search;

pub(crate) mod query_support;

pub mod shell;
pub mod web_fetch;

// ─── OutputCategory contract tests ───────────────────────────────────────────
//
// Each builtin tool that overrides `output_category()` is verified here so
// that renames or copy-paste errors are caught at compile time with a clear
// failure message.
#[cfg(test)]
mod output_category_tests {
    use crate::tool::OutputCategory;
    use crate::Tool;

    #[test]
    fn shell_tool_is_headtail() {
        let t = super::shell::ShellTool { timeout_secs: 30 };
        assert_eq!(t.output_category(), OutputCategory::HeadTail);
    }

    #[test]
    fn kubernetes_exec_is_headtail() {
        let t = super::kubernetes_exec::KubernetesExecTool::default();
        assert_eq!(t.output_category(), OutputCategory::HeadTail);
    }

    #[test]
    fn aws_exec_is_headtail() {
        let t = super::aws_exec::AwsExecTool::default();
        assert_eq!(t.output_category(), OutputCategory::HeadTail);
    }

    #[test]
    fn gcp_exec_is_headtail() {
        let t = super::gcp_exec::GcpExecTool::default();
        assert_eq!(t.output_category(), OutputCategory::HeadTail);
    }

    #[test]
    fn splunk_search_is_matchlist() {
        use std::sync::Arc;
        use uuid::Uuid;
        let t = super::splunk_search::SplunkSearchTool {
            base_url: "http://127.0.0.1:1".to_string(),
            secrets: Arc::new(aurora_secrets::SecretStore::new(&aurora_config::SecretsConfig::default())),
            tenant_id: Uuid::new_v4(),
        };
        assert_eq!(t.output_category(), OutputCategory::MatchList);
    }

    #[test]
    fn bitbucket_read_is_filecontent() {
        use std::sync::Arc;
        use uuid::Uuid;
        let t = super::bitbucket_read::BitbucketReadTool {
            base_url: "http://127.0.0.1:1".to_string(),
            secrets: Arc::new(aurora_secrets::SecretStore::new(&aurora_config::SecretsConfig::default())),
            tenant_id: Uuid::new_v4(),
        };
        assert_eq!(t.output_category(), OutputCategory::FileContent);
    }

    #[test]
    fn web_fetch_is_generic() {
        let t = super::web_fetch::WebFetchTool;
        assert_eq!(t.output_category(), OutputCategory::Generic);
    }
}
