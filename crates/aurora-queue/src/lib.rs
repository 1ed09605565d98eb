// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Delayed job scheduling and worker pool that drives the background RCA
//! workflow, context updates for merged incidents, and standalone incident
//! summary generation.

mod error;
pub mod jobs;
mod runbook;
mod runner;
mod scheduler;
mod tools;
mod worker;

pub use error::QueueError;
pub use jobs::{ContextUpdateJob, Job, RcaTrigger, SummaryGenerationJob};
pub use runner::{perform_merge, WorkerDeps};
pub use scheduler::Scheduler;

use std::sync::Arc;

use aurora_config::QueueConfig;
use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Owns the delayed-job heap and the worker pool draining it.
pub struct Queue {
    scheduler: Arc<Scheduler>,
    grace_period: Duration,
}

impl Queue {
    pub fn new(cfg: &QueueConfig) -> Self {
        Self {
            scheduler: Arc::new(Scheduler::new()),
            grace_period: Duration::seconds(cfg.rca_grace_period_secs as i64),
        }
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    /// Starts `worker_count` (per `QueueConfig`) worker tasks draining this
    /// queue's scheduler.
    pub fn spawn_workers(&self, deps: WorkerDeps, worker_count: usize) -> Vec<JoinHandle<()>> {
        worker::spawn_workers(self.scheduler.clone(), deps, worker_count)
    }

    /// Schedules the delayed RCA trigger for a freshly created incident,
    /// firing after the configured grace period so a late-arriving
    /// metadata-only event (e.g. a runbook link) has time to attach.
    pub fn schedule_rca(&self, tenant_id: Uuid, incident_id: Uuid, source: impl Into<String>) {
        let fire_at = Utc::now() + self.grace_period;
        self.scheduler.schedule(
            Job::Rca(RcaTrigger {
                incident_id,
                tenant_id,
                source: source.into(),
                fire_at,
            }),
            fire_at,
        );
    }

    pub fn schedule_summary(&self, tenant_id: Uuid, incident_id: Uuid) {
        self.scheduler.schedule(
            Job::SummaryGeneration(jobs::SummaryGenerationJob { tenant_id, incident_id }),
            Utc::now(),
        );
    }
}
