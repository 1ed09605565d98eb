// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Bounded worker pool draining the delayed-job scheduler.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::error;

use crate::jobs::Job;
use crate::runner::{run_context_update, run_rca_trigger, run_summary_generation, WorkerDeps};
use crate::scheduler::Scheduler;

/// Spawns `count` Tokio tasks, each looping: pull the next due job from
/// `scheduler`, execute it, log and move on on failure. A single failing job
/// never takes down the worker or blocks the rest of the pool.
pub fn spawn_workers(scheduler: Arc<Scheduler>, deps: WorkerDeps, count: usize) -> Vec<JoinHandle<()>> {
    (0..count.max(1))
        .map(|worker_id| {
            let scheduler = scheduler.clone();
            let deps = deps.clone();
            tokio::spawn(async move {
                loop {
                    let job = scheduler.next_due().await;
                    let result = match job {
                        Job::Rca(trigger) => run_rca_trigger(&deps, trigger).await,
                        Job::ContextUpdate(update) => run_context_update(&deps, update).await,
                        Job::SummaryGeneration(summary) => run_summary_generation(&deps, summary).await,
                    };
                    if let Err(e) = result {
                        error!(worker_id, error = %e, "queue job failed");
                    }
                }
            })
        })
        .collect()
}
