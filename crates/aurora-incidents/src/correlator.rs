// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Decides whether a new alert belongs to an existing incident.

use aurora_config::CorrelationConfig;
use aurora_store::{CorrelationStrategy, Incident};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;

use crate::normalize::NormalizedAlert;

/// Outcome of running the correlator against one new alert.
#[derive(Debug, Clone)]
pub struct CorrelationResult {
    pub is_correlated: bool,
    pub incident_id: Option<uuid::Uuid>,
    pub strategy: CorrelationStrategy,
    pub score: f32,
    pub details: serde_json::Value,
}

impl CorrelationResult {
    fn none() -> Self {
        Self {
            is_correlated: false,
            incident_id: None,
            strategy: CorrelationStrategy::Primary,
            score: 0.0,
            details: json!({}),
        }
    }
}

/// Strips timestamps, UUIDs, IPv4 addresses, long hex runs, and base64-ish
/// tokens from a title, then collapses whitespace — two alerts whose titles
/// differ only by embedded identifiers fingerprint identically.
pub fn title_fingerprint(title: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?").unwrap(),
            Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").unwrap(),
            Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap(),
            Regex::new(r"\b[0-9a-fA-F]{12,}\b").unwrap(),
            Regex::new(r"\b[A-Za-z0-9+/]{20,}={0,2}\b").unwrap(),
        ]
    });
    let mut stripped = title.to_lowercase();
    for pattern in patterns {
        stripped = pattern.replace_all(&stripped, " ").into_owned();
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run correlation for `alert` against `candidates` (the tenant's open,
/// non-merged incidents). Strategies are tried in priority order; the first
/// match wins. Among equally-scored candidates, the most recently updated
/// wins.
pub fn correlate(
    alert: &NormalizedAlert,
    candidates: &[Incident],
    cfg: &CorrelationConfig,
    now: DateTime<Utc>,
) -> CorrelationResult {
    let incident_key = alert
        .alert_metadata
        .get("incidentKey")
        .and_then(|v| v.as_str())
        .or_else(|| alert.alert_metadata.get("fingerprint").and_then(|v| v.as_str()));

    if let Some(key) = incident_key {
        if let Some(candidate) = candidates
            .iter()
            .filter(|c| {
                c.alert_metadata
                    .get("incidentKey")
                    .and_then(|v| v.as_str())
                    .or_else(|| c.alert_metadata.get("fingerprint").and_then(|v| v.as_str()))
                    == Some(key)
            })
            .max_by_key(|c| c.updated_at)
        {
            return CorrelationResult {
                is_correlated: true,
                incident_id: Some(candidate.id),
                strategy: CorrelationStrategy::Identity,
                score: 1.0,
                details: json!({ "matched_key": key }),
            };
        }
    }

    let fingerprint = title_fingerprint(&alert.title);
    if let Some(service) = &alert.service {
        if let Some(candidate) = candidates
            .iter()
            .filter(|c| c.alert_service.as_deref() == Some(service.as_str()))
            .filter(|c| title_fingerprint(&c.alert_title) == fingerprint)
            .max_by_key(|c| c.updated_at)
        {
            return CorrelationResult {
                is_correlated: true,
                incident_id: Some(candidate.id),
                strategy: CorrelationStrategy::ServiceFingerprint,
                score: 0.8,
                details: json!({ "fingerprint": fingerprint, "service": service }),
            };
        }
    }

    if let Some(service) = &alert.service {
        let window = chrono::Duration::seconds(cfg.service_time_window_secs);
        if let Some(candidate) = candidates
            .iter()
            .filter(|c| c.alert_service.as_deref() == Some(service.as_str()))
            .filter(|c| c.severity == alert.severity)
            .filter(|c| now.signed_duration_since(c.started_at) <= window)
            .max_by_key(|c| c.updated_at)
        {
            return CorrelationResult {
                is_correlated: true,
                incident_id: Some(candidate.id),
                strategy: CorrelationStrategy::ServiceTimeWindow,
                score: 0.5,
                details: json!({ "service": service, "window_secs": cfg.service_time_window_secs }),
            };
        }
    }

    CorrelationResult::none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_store::{AuroraStatus, IncidentStatus};
    use uuid::Uuid;

    fn incident(service: &str, title: &str, severity: aurora_store::Severity, started_at: DateTime<Utc>) -> Incident {
        Incident {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            source_type: "pagerduty".into(),
            source_alert_id: "1".into(),
            status: IncidentStatus::Investigating,
            aurora_status: AuroraStatus::Idle,
            severity,
            alert_title: title.into(),
            alert_service: Some(service.into()),
            affected_services: vec![service.into()],
            correlated_alert_count: 1,
            aurora_summary: None,
            aurora_chat_session_id: None,
            alert_metadata: json!({}),
            merged_into_incident_id: None,
            started_at,
            updated_at: started_at,
        }
    }

    fn alert(service: &str, title: &str, severity: aurora_store::Severity) -> NormalizedAlert {
        NormalizedAlert {
            source_type: "pagerduty".into(),
            external_id: "2".into(),
            dedup_key: "2".into(),
            title: title.into(),
            status_raw: "investigating".into(),
            severity,
            service: Some(service.into()),
            alert_metadata: json!({}),
            is_creation_event: true,
            metadata_only: false,
        }
    }

    #[test]
    fn title_fingerprint_strips_volatile_tokens() {
        let a = title_fingerprint("API 5xx spike at 2026-07-30T10:00:00Z on 10.0.0.5");
        let b = title_fingerprint("API 5xx spike at 2026-07-30T10:05:32Z on 10.0.0.9");
        assert_eq!(a, b);
    }

    #[test]
    fn identity_match_wins_over_fingerprint() {
        let now = Utc::now();
        let mut matching_key = incident("api", "API 5xx spike", aurora_store::Severity::High, now);
        matching_key.alert_metadata = json!({ "incidentKey": "K1" });
        let candidates = vec![matching_key];

        let mut a = alert("api", "API 5xx spike", aurora_store::Severity::High);
        a.alert_metadata = json!({ "incidentKey": "K1" });

        let cfg = CorrelationConfig::default();
        let result = correlate(&a, &candidates, &cfg, now);
        assert!(result.is_correlated);
        assert_eq!(result.strategy, CorrelationStrategy::Identity);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn service_fingerprint_match_when_no_identity() {
        let now = Utc::now();
        let candidates = vec![incident("api", "API 5xx spike", aurora_store::Severity::High, now)];
        let a = alert("api", "API 5xx spike", aurora_store::Severity::High);
        let cfg = CorrelationConfig::default();
        let result = correlate(&a, &candidates, &cfg, now);
        assert!(result.is_correlated);
        assert_eq!(result.strategy, CorrelationStrategy::ServiceFingerprint);
    }

    #[test]
    fn service_time_window_fallback() {
        let now = Utc::now();
        let candidates = vec![incident("api", "Totally different title", aurora_store::Severity::High, now)];
        let a = alert("api", "API 5xx spike", aurora_store::Severity::High);
        let cfg = CorrelationConfig::default();
        let result = correlate(&a, &candidates, &cfg, now);
        assert!(result.is_correlated);
        assert_eq!(result.strategy, CorrelationStrategy::ServiceTimeWindow);
        assert_eq!(result.score, 0.5);
    }

    #[test]
    fn no_match_when_service_differs_and_no_identity() {
        let now = Utc::now();
        let candidates = vec![incident("db", "DB latency spike", aurora_store::Severity::High, now)];
        let a = alert("api", "API 5xx spike", aurora_store::Severity::High);
        let cfg = CorrelationConfig::default();
        let result = correlate(&a, &candidates, &cfg, now);
        assert!(!result.is_correlated);
    }

    #[test]
    fn outside_time_window_does_not_match() {
        let now = Utc::now();
        let old = now - chrono::Duration::seconds(10_000);
        let candidates = vec![incident("api", "Different incident entirely", aurora_store::Severity::High, old)];
        let a = alert("api", "API 5xx spike", aurora_store::Severity::High);
        let cfg = CorrelationConfig { service_time_window_secs: 3600 };
        let result = correlate(&a, &candidates, &cfg, now);
        assert!(!result.is_correlated);
    }
}
