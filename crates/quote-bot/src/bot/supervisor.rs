//! Bounded, cancellable execution of background replies
//!
//! Every job runs on its own task but waits for a permit before doing any
//! work, so at most `max_inflight` jobs are active at once while submission
//! never blocks the caller. Outcomes are collected here and logged.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How a background job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Reply sent normally
    Completed { reply_id: u64 },
    /// Work failed but an error reply went out
    Recovered { reply_id: u64, error: String },
    /// No reply could be sent
    Failed { error: String },
    /// Stopped by shutdown before finishing
    Cancelled,
}

/// Counters over collected outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub spawned: usize,
    pub completed: usize,
    pub recovered: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub panicked: usize,
}

impl SupervisorStats {
    /// Jobs whose outcome has been collected
    pub fn finished(&self) -> usize {
        self.completed + self.recovered + self.failed + self.cancelled + self.panicked
    }
}

/// Owns all background jobs spawned by the dispatcher
pub struct TaskSupervisor {
    tasks: JoinSet<TaskOutcome>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    stats: SupervisorStats,
}

impl TaskSupervisor {
    /// Create a supervisor running at most `max_inflight` jobs at once
    ///
    /// Cancelling `cancel` stops queued and running jobs.
    pub fn new(max_inflight: usize, cancel: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(max_inflight.max(1))),
            cancel,
            stats: SupervisorStats::default(),
        }
    }

    /// Submit a job without waiting for it
    pub fn spawn<F>(&mut self, label: impl Into<String>, job: F)
    where
        F: Future<Output = TaskOutcome> + Send + 'static,
    {
        let label = label.into();
        let permits = Arc::clone(&self.permits);
        let cancel = self.cancel.clone();

        self.tasks.spawn(async move {
            let work = async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return TaskOutcome::Cancelled;
                };
                debug!(%label, "Job started");
                job.await
            };

            // Cancellation wins when the job is ready in the same poll
            tokio::select! {
                biased;
                () = cancel.cancelled() => TaskOutcome::Cancelled,
                outcome = work => outcome,
            }
        });
        self.stats.spawned += 1;

        self.reap();
    }

    /// Collect outcomes of jobs that already finished
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.record(result);
        }
    }

    /// Wait for every submitted job to finish
    pub async fn wait_idle(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            self.record(result);
        }
    }

    /// Cancel outstanding jobs and wait for them to stop
    pub async fn shutdown(mut self) -> SupervisorStats {
        self.cancel.cancel();
        self.wait_idle().await;
        self.stats
    }

    /// Jobs submitted but not yet collected
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn stats(&self) -> SupervisorStats {
        self.stats
    }

    fn record(&mut self, result: Result<TaskOutcome, JoinError>) {
        match result {
            Ok(TaskOutcome::Completed { reply_id }) => {
                debug!(reply_id, "Job completed");
                self.stats.completed += 1;
            }
            Ok(TaskOutcome::Recovered { reply_id, error }) => {
                warn!(reply_id, "Job recovered from failure: {}", error);
                self.stats.recovered += 1;
            }
            Ok(TaskOutcome::Failed { error }) => {
                error!("Job failed: {}", error);
                self.stats.failed += 1;
            }
            Ok(TaskOutcome::Cancelled) => {
                debug!("Job cancelled");
                self.stats.cancelled += 1;
            }
            Err(e) if e.is_panic() => {
                error!("Job panicked: {}", e);
                self.stats.panicked += 1;
            }
            Err(e) => {
                debug!("Job aborted: {}", e);
                self.stats.cancelled += 1;
            }
        }
    }
}
