// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-source webhook normalization.
//!
//! Each monitoring/ticketing source speaks its own payload shape. This
//! module maps every supported source down to one [`NormalizedAlert`] the
//! rest of the pipeline can treat uniformly.

use aurora_store::Severity;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::IncidentError;

/// A webhook payload reduced to the fields the pipeline needs, independent
/// of which source produced it.
#[derive(Debug, Clone)]
pub struct NormalizedAlert {
    pub source_type: String,
    /// External id/number used as `source_alert_id`.
    pub external_id: String,
    pub dedup_key: String,
    pub title: String,
    pub status_raw: String,
    pub severity: Severity,
    pub service: Option<String>,
    pub alert_metadata: Value,
    /// `true` for an event that can create a new incident (e.g. PagerDuty
    /// `incident.triggered`, Grafana `firing`). `false` for a status update,
    /// resolution, or metadata-only follow-up.
    pub is_creation_event: bool,
    /// `true` when this event only carries metadata to merge into an
    /// existing incident (e.g. PagerDuty custom-field updates) and carries
    /// no status/severity/title of its own.
    pub metadata_only: bool,
}

pub fn normalize(source_type: &str, payload: &Value, received_at: DateTime<Utc>) -> Result<NormalizedAlert, IncidentError> {
    match source_type {
        "pagerduty" => normalize_pagerduty(payload, received_at),
        "grafana" => normalize_grafana(payload),
        "datadog" => normalize_datadog(payload),
        "netdata" => normalize_netdata(payload),
        "splunk" => normalize_splunk(payload),
        "dynatrace" => normalize_dynatrace(payload),
        "jenkins" => normalize_jenkins(payload),
        other => Err(IncidentError::UnsupportedSource(other.to_string())),
    }
}

fn severity_from_priority(name: &str) -> Severity {
    let name = name.to_lowercase();
    if name.contains("p1") || name.contains("critical") || name.contains("sev1") {
        Severity::Critical
    } else if name.contains("p2") || name.contains("high") || name.contains("sev2") {
        Severity::High
    } else if name.contains("p3") || name.contains("medium") || name.contains("sev3") {
        Severity::Medium
    } else if name.contains("p4") || name.contains("low") || name.contains("sev4") {
        Severity::Low
    } else {
        Severity::Info
    }
}

fn normalize_pagerduty(payload: &Value, received_at: DateTime<Utc>) -> Result<NormalizedAlert, IncidentError> {
    let event = payload.get("event").unwrap_or(payload);
    let event_type = event
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let data = event.get("data").cloned().unwrap_or(Value::Null);

    if event_type == "incident.custom_field_values.updated" {
        let incident_ref = data.get("incident").cloned().unwrap_or(Value::Null);
        let incident_id = incident_ref
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| IncidentError::MalformedPayload("missing incident.id".into()))?;

        let mut custom_fields = serde_json::Map::new();
        if let Some(fields) = data.get("custom_fields").and_then(Value::as_array) {
            for field in fields {
                if let (Some(name), Some(value)) = (
                    field.get("name").and_then(Value::as_str),
                    field.get("value"),
                ) {
                    custom_fields.insert(name.to_string(), value.clone());
                }
            }
        }

        return Ok(NormalizedAlert {
            source_type: "pagerduty".into(),
            external_id: incident_id.to_string(),
            dedup_key: incident_id.to_string(),
            title: String::new(),
            status_raw: String::new(),
            severity: Severity::Info,
            service: None,
            alert_metadata: json!({ "incidentId": incident_id, "customFields": custom_fields }),
            is_creation_event: false,
            metadata_only: true,
        });
    }

    let incident_id = data
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| IncidentError::MalformedPayload("missing incident.id".into()))?;
    let incident_number = data.get("number").and_then(Value::as_u64);
    let title = data
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled Incident")
        .to_string();
    let status = data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let urgency = data
        .get("urgency")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let service = data.get("service").cloned().unwrap_or(Value::Null);
    let service_name = service
        .get("summary")
        .or_else(|| service.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let severity = match data.get("priority").and_then(Value::as_object) {
        Some(priority) => match priority.get("name").or_else(|| priority.get("summary")).and_then(Value::as_str) {
            Some(name) => severity_from_priority(name),
            None => {
                if urgency == "high" {
                    Severity::High
                } else {
                    Severity::Medium
                }
            }
        },
        None => {
            if urgency == "high" {
                Severity::High
            } else {
                Severity::Medium
            }
        }
    };

    let status_raw = if status.eq_ignore_ascii_case("resolved") {
        "resolved".to_string()
    } else {
        "investigating".to_string()
    };

    let mut metadata = serde_json::Map::new();
    metadata.insert("incidentId".into(), json!(incident_id));
    metadata.insert("incidentUrl".into(), data.get("html_url").cloned().unwrap_or(Value::Null));
    metadata.insert("urgency".into(), json!(urgency));
    if let Some(key) = data.get("incident_key").and_then(Value::as_str) {
        metadata.insert("incidentKey".into(), json!(key));
    }
    if let Some(priority) = data.get("priority") {
        let summary = priority
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| priority.to_string());
        metadata.insert("priority".into(), json!(summary));
    }
    if let Some(details) = data.get("body").and_then(|b| b.get("details")).and_then(Value::as_str) {
        metadata.insert("description".into(), json!(details));
    }

    let external_id = incident_number
        .map(|n| n.to_string())
        .unwrap_or_else(|| incident_id.to_string());

    Ok(NormalizedAlert {
        source_type: "pagerduty".into(),
        external_id,
        dedup_key: format!("{incident_id}:{event_type}:{received_at}"),
        title,
        status_raw,
        severity,
        service: Some(service_name),
        alert_metadata: Value::Object(metadata),
        is_creation_event: event_type == "incident.triggered",
        metadata_only: false,
    })
}

fn normalize_grafana(payload: &Value) -> Result<NormalizedAlert, IncidentError> {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("firing");
    let alerts = payload.get("alerts").and_then(Value::as_array);
    let first = alerts.and_then(|a| a.first()).cloned().unwrap_or(Value::Null);
    let labels = first.get("labels").cloned().unwrap_or(Value::Null);
    let annotations = first.get("annotations").cloned().unwrap_or(Value::Null);

    let alertname = labels
        .get("alertname")
        .and_then(Value::as_str)
        .unwrap_or("Grafana Alert");
    let fingerprint = first
        .get("fingerprint")
        .and_then(Value::as_str)
        .or_else(|| payload.get("groupKey").and_then(Value::as_str))
        .unwrap_or(alertname)
        .to_string();
    let service = labels
        .get("service")
        .or_else(|| labels.get("job"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let severity = labels
        .get("severity")
        .and_then(Value::as_str)
        .map(|s| match s.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Medium,
            "info" => Severity::Info,
            _ => Severity::High,
        })
        .unwrap_or(Severity::High);

    Ok(NormalizedAlert {
        source_type: "grafana".into(),
        external_id: fingerprint.clone(),
        dedup_key: fingerprint,
        title: annotations
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or(alertname)
            .to_string(),
        status_raw: if status == "resolved" { "resolved".into() } else { "investigating".into() },
        severity,
        service,
        alert_metadata: json!({ "labels": labels, "annotations": annotations }),
        is_creation_event: status == "firing",
        metadata_only: false,
    })
}

fn normalize_datadog(payload: &Value) -> Result<NormalizedAlert, IncidentError> {
    let id = payload
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| payload.get("alert_id").and_then(Value::as_str))
        .ok_or_else(|| IncidentError::MalformedPayload("missing id".into()))?
        .to_string();
    let transition = payload
        .get("transition")
        .and_then(Value::as_str)
        .unwrap_or("Triggered");
    let severity = payload
        .get("alert_type")
        .and_then(Value::as_str)
        .map(|s| match s {
            s if s.contains("error") => Severity::Critical,
            s if s.contains("warning") => Severity::Medium,
            _ => Severity::High,
        })
        .unwrap_or(Severity::High);

    Ok(NormalizedAlert {
        source_type: "datadog".into(),
        external_id: id.clone(),
        dedup_key: id,
        title: payload
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Datadog Monitor Alert")
            .to_string(),
        status_raw: if transition.eq_ignore_ascii_case("recovered") { "resolved".into() } else { "investigating".into() },
        severity,
        service: payload.get("tags").and_then(Value::as_array).and_then(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .find_map(|t| t.strip_prefix("service:").map(str::to_string))
        }),
        alert_metadata: json!({ "raw": payload }),
        is_creation_event: transition.eq_ignore_ascii_case("triggered") || transition.eq_ignore_ascii_case("alert"),
        metadata_only: false,
    })
}

fn normalize_netdata(payload: &Value) -> Result<NormalizedAlert, IncidentError> {
    let alarm_id = payload
        .get("alarm_id")
        .and_then(Value::as_str)
        .or_else(|| payload.get("unique_id").and_then(Value::as_str))
        .ok_or_else(|| IncidentError::MalformedPayload("missing alarm_id".into()))?
        .to_string();
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("WARNING");

    Ok(NormalizedAlert {
        source_type: "netdata".into(),
        external_id: alarm_id.clone(),
        dedup_key: alarm_id,
        title: payload
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Netdata Alarm")
            .to_string(),
        status_raw: if status.eq_ignore_ascii_case("CLEAR") { "resolved".into() } else { "investigating".into() },
        severity: match status.to_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "WARNING" => Severity::Medium,
            _ => Severity::Info,
        },
        service: payload.get("chart").and_then(Value::as_str).map(str::to_string),
        alert_metadata: json!({ "raw": payload }),
        is_creation_event: !status.eq_ignore_ascii_case("CLEAR"),
        metadata_only: false,
    })
}

fn normalize_splunk(payload: &Value) -> Result<NormalizedAlert, IncidentError> {
    let sid = payload
        .get("sid")
        .and_then(Value::as_str)
        .or_else(|| payload.get("search_name").and_then(Value::as_str))
        .ok_or_else(|| IncidentError::MalformedPayload("missing sid".into()))?
        .to_string();

    Ok(NormalizedAlert {
        source_type: "splunk".into(),
        external_id: sid.clone(),
        dedup_key: sid,
        title: payload
            .get("search_name")
            .and_then(Value::as_str)
            .unwrap_or("Splunk Saved Search Alert")
            .to_string(),
        status_raw: "investigating".into(),
        severity: Severity::High,
        service: None,
        alert_metadata: json!({ "raw": payload }),
        is_creation_event: true,
        metadata_only: false,
    })
}

fn normalize_dynatrace(payload: &Value) -> Result<NormalizedAlert, IncidentError> {
    let pid = payload
        .get("PID")
        .and_then(Value::as_str)
        .or_else(|| payload.get("ProblemID").and_then(Value::as_str))
        .ok_or_else(|| IncidentError::MalformedPayload("missing PID".into()))?
        .to_string();
    let state = payload
        .get("State")
        .and_then(Value::as_str)
        .unwrap_or("OPEN");
    let severity = payload
        .get("ProblemSeverity")
        .and_then(Value::as_str)
        .map(|s| match s.to_uppercase().as_str() {
            "AVAILABILITY" | "ERROR" => Severity::Critical,
            "PERFORMANCE" => Severity::High,
            "RESOURCE_CONTENTION" => Severity::Medium,
            _ => Severity::Info,
        })
        .unwrap_or(Severity::High);

    Ok(NormalizedAlert {
        source_type: "dynatrace".into(),
        external_id: pid.clone(),
        dedup_key: pid,
        title: payload
            .get("ProblemTitle")
            .and_then(Value::as_str)
            .unwrap_or("Dynatrace Problem")
            .to_string(),
        status_raw: if state.eq_ignore_ascii_case("RESOLVED") { "resolved".into() } else { "investigating".into() },
        severity,
        service: payload
            .get("ImpactedEntities")
            .and_then(Value::as_array)
            .and_then(|e| e.first())
            .and_then(|e| e.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        alert_metadata: json!({ "raw": payload }),
        is_creation_event: state.eq_ignore_ascii_case("OPEN"),
        metadata_only: false,
    })
}

fn normalize_jenkins(payload: &Value) -> Result<NormalizedAlert, IncidentError> {
    let build = payload.get("build").cloned().unwrap_or(Value::Null);
    let job_name = payload
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Jenkins Job")
        .to_string();
    let number = build.get("number").and_then(Value::as_u64).unwrap_or_default();
    let result = build
        .get("phase")
        .and_then(Value::as_str)
        .unwrap_or("STARTED");
    let status = build.get("status").and_then(Value::as_str).unwrap_or("");
    let failed = status.eq_ignore_ascii_case("FAILURE") || status.eq_ignore_ascii_case("FAILED");

    Ok(NormalizedAlert {
        source_type: "jenkins".into(),
        external_id: format!("{job_name}#{number}"),
        dedup_key: format!("{job_name}#{number}:{result}"),
        title: format!("{job_name} build #{number} {status}").trim().to_string(),
        status_raw: if status.eq_ignore_ascii_case("SUCCESS") { "resolved".into() } else { "investigating".into() },
        severity: if failed { Severity::High } else { Severity::Info },
        service: Some(job_name),
        alert_metadata: json!({ "raw": payload }),
        is_creation_event: failed,
        metadata_only: false,
    })
}
