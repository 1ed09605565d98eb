// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Best-effort runbook fetch for the delayed RCA trigger.

use tracing::warn;

const MAX_RUNBOOK_CHARS: usize = 20_000;

/// Fetches `url` and converts any HTML response to plain text, truncated to
/// a sane size. Never fails the caller — a fetch error just means the RCA
/// prompt proceeds without the runbook body.
pub async fn fetch_runbook(url: &str) -> Option<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .ok()?;

    let resp = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(url, error = %e, "runbook fetch failed");
            return None;
        }
    };
    if !resp.status().is_success() {
        warn!(url, status = %resp.status(), "runbook fetch returned non-success status");
        return None;
    }
    let is_html = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("html"))
        .unwrap_or(true);
    let body = match resp.text().await {
        Ok(b) => b,
        Err(e) => {
            warn!(url, error = %e, "runbook body read failed");
            return None;
        }
    };

    let mut text = if is_html {
        html2text::from_read(body.as_bytes(), 100)
    } else {
        body
    };
    if text.len() > MAX_RUNBOOK_CHARS {
        text.truncate(MAX_RUNBOOK_CHARS);
    }
    Some(text)
}

/// Builds the RCA prompt, prepending the runbook body (if present) per the
/// `=== RUNBOOK === ... === INCIDENT DETAILS === ...` convention.
pub fn build_rca_prompt(runbook: Option<&str>, incident_details: &str) -> String {
    match runbook {
        Some(body) => format!("=== RUNBOOK ===\n{body}\n\n=== INCIDENT DETAILS ===\n{incident_details}"),
        None => incident_details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_runbook_is_just_details() {
        assert_eq!(build_rca_prompt(None, "incident stuff"), "incident stuff");
    }

    #[test]
    fn prompt_with_runbook_prepends_it() {
        let prompt = build_rca_prompt(Some("do the thing"), "incident stuff");
        assert!(prompt.starts_with("=== RUNBOOK ===\ndo the thing"));
        assert!(prompt.contains("=== INCIDENT DETAILS ===\nincident stuff"));
    }
}
