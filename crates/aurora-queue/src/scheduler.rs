// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! In-process delayed-job heap. Every job carries its own tenant/incident
//! ids rather than relying on closures, so a future distributed deployment
//! could back this with the persistence layer without changing job shapes.

use std::collections::BinaryHeap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::Duration;

use crate::jobs::{Job, ScheduledJob};

/// `ScheduledJob::cmp` is already reversed (see its impl), so a plain
/// `BinaryHeap<ScheduledJob>` pops the job with the earliest `fire_at` —
/// a min-heap built out of std's max-heap.
pub struct Scheduler {
    heap: Mutex<BinaryHeap<ScheduledJob>>,
    notify: Notify,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
        }
    }

    pub fn schedule(&self, job: Job, fire_at: chrono::DateTime<Utc>) {
        self.heap.lock().unwrap().push(ScheduledJob { fire_at, job });
        self.notify.notify_one();
    }

    /// Blocks until a due job is available, then returns it. Re-sleeps when
    /// woken early by a newly-scheduled job that isn't yet due.
    pub async fn next_due(&self) -> Job {
        loop {
            let wait = {
                let mut heap = self.heap.lock().unwrap();
                match heap.peek() {
                    None => None,
                    Some(scheduled) => {
                        let now = Utc::now();
                        if scheduled.fire_at <= now {
                            return heap.pop().unwrap().job;
                        }
                        Some((scheduled.fire_at - now).to_std().unwrap_or(Duration::ZERO))
                    }
                }
            };

            match wait {
                Some(d) => {
                    let _ = tokio::time::timeout(d, self.notify.notified()).await;
                }
                None => self.notify.notified().await,
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
