// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod confirmation;
pub mod events;
pub mod policy;
pub mod registry;
pub mod tool;

pub use confirmation::{ConfirmationBroker, ConfirmationDecision, ConfirmationRequest};
pub use events::ToolEvent;
pub use policy::{ApprovalPolicy, ToolPolicy};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{OutputCategory, Tool, ToolCall, ToolOutput, ToolOutputPart};

// Observability query tools
pub use builtin::datadog_query::DatadogQueryTool;
pub use builtin::dynatrace_query::DynatraceQueryTool;
pub use builtin::grafana_query::GrafanaQueryTool;
pub use builtin::netdata_query::NetdataQueryTool;
pub use builtin::splunk_search::SplunkSearchTool;

// Runbook / knowledge tools
pub use builtin::confluence_search::ConfluenceSearchTool;

// Cloud and workload exec tools
pub use builtin::aws_exec::AwsExecTool;
pub use builtin::gcp_exec::GcpExecTool;
pub use builtin::kubernetes_exec::KubernetesExecTool;

// CI/CD and source control tools
pub use builtin::bitbucket_read::BitbucketReadTool;
pub use builtin::pipeline_tool::PipelineTool;

pub use builtin::shell::ShellTool;
pub use builtin::web_fetch::WebFetchTool;
