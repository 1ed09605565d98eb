// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Job kinds drained by the worker pool.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fires the background RCA workflow for an incident, once the grace
/// period after `fire_at` has elapsed and no session for `(incident_id,
/// source)` already exists.
#[derive(Debug, Clone)]
pub struct RcaTrigger {
    pub incident_id: Uuid,
    pub tenant_id: Uuid,
    pub source: String,
    pub fire_at: DateTime<Utc>,
}

/// Delivers a summary block from a merged-away incident into a live target
/// incident's next agent turn.
#[derive(Debug, Clone)]
pub struct ContextUpdateJob {
    pub tenant_id: Uuid,
    pub target_incident_id: Uuid,
    pub summary_block: String,
}

/// Produces `Incident.aurora_summary` via a one-shot, tool-free agent call.
#[derive(Debug, Clone)]
pub struct SummaryGenerationJob {
    pub tenant_id: Uuid,
    pub incident_id: Uuid,
}

#[derive(Debug, Clone)]
pub enum Job {
    Rca(RcaTrigger),
    ContextUpdate(ContextUpdateJob),
    SummaryGeneration(SummaryGenerationJob),
}

#[derive(Debug, Clone)]
pub(crate) struct ScheduledJob {
    pub fire_at: DateTime<Utc>,
    pub job: Job,
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at
    }
}
impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Reversed so a `BinaryHeap<ScheduledJob>` is a min-heap on `fire_at`
/// (earliest job first).
impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.fire_at.cmp(&self.fire_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BinaryHeap;

    fn job_at(secs: i64) -> ScheduledJob {
        let base = Utc.timestamp_opt(0, 0).unwrap();
        ScheduledJob {
            fire_at: base + chrono::Duration::seconds(secs),
            job: Job::SummaryGeneration(SummaryGenerationJob {
                tenant_id: Uuid::new_v4(),
                incident_id: Uuid::new_v4(),
            }),
        }
    }

    #[test]
    fn heap_pops_earliest_fire_at_first() {
        let mut heap = BinaryHeap::new();
        heap.push(job_at(300));
        heap.push(job_at(100));
        heap.push(job_at(200));

        assert_eq!(heap.pop().unwrap().fire_at, job_at(100).fire_at);
        assert_eq!(heap.pop().unwrap().fire_at, job_at(200).fire_at);
        assert_eq!(heap.pop().unwrap().fire_at, job_at(300).fire_at);
    }
}
