// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::Local;

use aurora_config::AgentMode;

/// All optional contextual blocks that can be injected into the system prompt.
#[derive(Debug, Default)]
pub struct PromptContext<'a> {
    /// Pre-formatted incident summary (title, severity, affected service,
    /// correlated alert excerpt).
    ///
    /// **Caching note**: this is *volatile* — a new correlated alert can
    /// change it mid-investigation. When prompt caching is enabled this
    /// content is placed in a separate, uncached system block so the stable
    /// prefix remains cacheable across turns.
    pub incident_summary: Option<&'a str>,
    /// Text appended verbatim after the default Guidelines section.
    pub append: Option<&'a str>,
}

impl<'a> PromptContext<'a> {
    /// Return a version of this context with the volatile fields cleared.
    ///
    /// Used to build the *stable* (cacheable) portion of the system prompt.
    pub fn stable_only(&self) -> Self {
        Self {
            incident_summary: None,
            append: self.append,
        }
    }

    /// Format the volatile fields as a block suitable for appending to the
    /// system prompt outside the cached region.
    ///
    /// Returns `None` when no incident summary is present.
    pub fn dynamic_block(&self) -> Option<String> {
        self.incident_summary
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("## Incident Context\n\n{s}"))
    }
}

// ─── Guidelines Module ───────────────────────────────────────────────────────
// Modular guidelines for easier maintenance and testing

mod guidelines {
    pub fn general() -> &'static str {
        "- Be concise and precise. Prefer tool output over guessing at system state.\n\
         - Confirm the affected service and environment before taking any remediating action.\n\
         - State your hypothesis before running a tool that tests it."
    }

    pub fn tool_usage() -> &'static str {
        "- Start with read-only observability tools (`grafana_query`, `datadog_query`, `netdata_query`, \
           `splunk_search`) before reaching for exec tools.\n\
         - Use `confluence_search` to check for an existing runbook before improvising a remediation.\n\
         - Prefer `kubernetes_exec` describe/logs/get subcommands over `aws_exec`/`gcp_exec` for workload-level \
           investigation; reserve cloud exec tools for infrastructure-level checks.\n\
         - Batch independent read-only tool calls in parallel — querying three dashboards at once is faster \
           than three round trips.\n\
         - Any tool call that mutates state (restart, scale, rollback, pipeline trigger) requires human \
           confirmation; expect it to pause and wait."
    }

    pub fn investigation_quality() -> &'static str {
        "- Cite the specific alert, log line, or metric that supports each claim in your findings.\n\
         - Distinguish between the triggering symptom and the root cause; do not stop at the first anomaly.\n\
         - When multiple incidents are correlated together, account for all of them in the root cause, not \
           just the one that opened the session.\n\
         - Write the final root cause summary so an on-call engineer unfamiliar with this incident could read \
           it and understand what happened and what was done."
    }

    pub fn workflow_efficiency() -> &'static str {
        "- Work systematically: gather evidence, form a hypothesis, test it, then propose or take action.\n\
         - Do not repeat a query that already returned a conclusive answer this run.\n\
         - Keep the user informed of your current hypothesis before executing a destructive tool call so the \
           confirmation prompt has context."
    }

    pub fn error_handling() -> &'static str {
        "- When a tool call fails or times out, do not retry it unchanged — adjust the query window, filters, \
           or target before trying again.\n\
         - If a destructive action is declined by the human reviewer, do not attempt an equivalent action \
           through a different tool without asking again.\n\
         - NEVER fabricate metric values, log lines, or command output — report a tool failure as a failure."
    }
}

fn build_guidelines_section() -> String {
    format!(
        "## Guidelines\n\n\
         ### General Principles\n\
         {}\n\n\
         ### Tool Usage Patterns\n\
         {}\n\n\
         ### Investigation Quality\n\
         {}\n\n\
         ### Workflow Efficiency\n\
         {}\n\n\
         ### Error Handling\n\
         {}",
        guidelines::general(),
        guidelines::tool_usage(),
        guidelines::investigation_quality(),
        guidelines::workflow_efficiency(),
        guidelines::error_handling(),
    )
}

/// Build the system prompt for the given agent mode.
///
/// `ctx` carries the incident summary and any append text for this run.
pub fn system_prompt(mode: AgentMode, custom: Option<&str>, ctx: PromptContext<'_>) -> String {
    if let Some(custom) = custom {
        if let Some(extra) = ctx.append {
            return format!("{}\n\n{}", custom.trim_end(), extra);
        }
        return custom.to_string();
    }

    let agent_identity = format!(
        "You are Aurora, an agentic incident-response assistant for site reliability engineers.\n\n\
         Operating Mode: `{mode}`\n\n\
         Current date and time: `{current_date_time}`\n\
         Core Capabilities:\n\
         - Correlates alerts from PagerDuty, Grafana, Datadog, Netdata, Splunk, Dynatrace, and Jenkins into \
           incidents and investigates them end to end\n\
         - Executes tools against cloud providers, Kubernetes, CI pipelines, and wikis, with human confirmation \
           required for any destructive or mutating action\n\
         - Streams its reasoning and tool calls live over the session transport so the reviewing engineer can \
           follow, interrupt, or confirm in real time\n\
         - Persists every tool call and its result so a completed run is a reproducible record of what was \
           investigated and why",
        current_date_time = Local::now().format("%Y-%m-%d %H:%M:%S"),
    );

    let mode_instructions = match mode {
        AgentMode::Ask => {
            "You are operating in read-only mode. You may query observability tools, search runbooks, and \
             inspect cloud/Kubernetes resource state. You MUST NOT execute any tool that requires confirmation \
             or mutates state — such tools are unavailable to you in this mode. Focus on gathering evidence and \
             reporting findings; do not propose a remediation action as if you had already taken it."
        }
        AgentMode::Agent => {
            "You are operating with full investigation and remediation capability. You may query observability \
             tools, inspect cloud/Kubernetes resource state, and execute mutating actions — mutating actions \
             will pause for human confirmation before they run. Work systematically: gather evidence, form a \
             root-cause hypothesis, verify it, then either report the finding or carry out an approved \
             remediation. Always complete the investigation before ending your turn."
        }
    };

    let incident_section = if let Some(s) = ctx.incident_summary {
        format!("\n\n## Incident Context\n\n{s}")
    } else {
        String::new()
    };

    let guidelines_section = build_guidelines_section();

    let append_section = if let Some(extra) = ctx.append {
        format!("\n\n{extra}")
    } else {
        String::new()
    };

    format!(
        "{agent_identity}\n\n{mode_instructions}{incident_section}\n\n{guidelines_section}{append_section}",
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
