//! Background task dispatcher.
//!
//! Polls the processing-task queue every `poll_interval` (or as soon as an
//! ingest signals new work) and hands claimed tasks to the
//! [`VideoProcessor`]. Claims go through `SELECT FOR UPDATE SKIP LOCKED`,
//! so several dispatchers can share one queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use vidintel_db::repositories::TaskRepo;

use crate::env_or;
use crate::processor::VideoProcessor;

/// Dispatcher tunables.
///
/// | Env var                | Default |
/// |------------------------|---------|
/// | `DISPATCH_POLL_MS`     | `1000`  |
/// | `DISPATCH_CONCURRENCY` | `4`     |
/// | `TASK_LEASE_SECS`      | `300`   |
/// | `STRANDED_AFTER_SECS`  | `600`   |
/// | `STRANDED_SWEEP_SECS`  | `60`    |
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    /// Maximum number of videos processed at once.
    pub concurrency: usize,
    /// How long a claimed task is owned before it may be redelivered.
    pub lease: Duration,
    /// Non-terminal videos untouched for this long get a fresh task.
    pub stranded_after: Duration,
    /// Time between stranded sweeps.
    pub sweep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            concurrency: 4,
            lease: Duration::from_secs(300),
            stranded_after: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl DispatcherConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_millis(env_or::<u64>("DISPATCH_POLL_MS", 1000).max(10)),
            concurrency: env_or("DISPATCH_CONCURRENCY", defaults.concurrency).max(1),
            lease: Duration::from_secs(env_or("TASK_LEASE_SECS", 300)),
            stranded_after: Duration::from_secs(env_or("STRANDED_AFTER_SECS", 600)),
            sweep_interval: Duration::from_secs(env_or::<u64>("STRANDED_SWEEP_SECS", 60).max(1)),
        }
    }
}

/// Long-lived Tokio task feeding claimed processing tasks to the processor.
pub struct TaskDispatcher {
    tasks: TaskRepo,
    processor: Arc<VideoProcessor>,
    wake: Arc<Notify>,
    config: DispatcherConfig,
}

impl TaskDispatcher {
    pub fn new(
        tasks: TaskRepo,
        processor: Arc<VideoProcessor>,
        wake: Arc<Notify>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            tasks,
            processor,
            wake,
            config,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    ///
    /// Tasks already being processed are allowed to finish before this
    /// returns.
    pub async fn run(&self, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut workers = JoinSet::new();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        let mut sweeper = tokio::time::interval(self.config.sweep_interval);

        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            concurrency = self.config.concurrency,
            "Task dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Task dispatcher shutting down");
                    break;
                }
                _ = sweeper.tick() => self.sweep_stranded().await,
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }

            while let Some(joined) = workers.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Processing task panicked");
                }
            }

            self.dispatch(&semaphore, &mut workers).await;
        }

        let in_flight = workers.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight processing to finish");
        }
        while workers.join_next().await.is_some() {}
    }

    /// Claim tasks while processing slots are free.
    async fn dispatch(&self, semaphore: &Arc<Semaphore>, workers: &mut JoinSet<()>) {
        loop {
            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else {
                return;
            };

            match self.tasks.claim(self.config.lease).await {
                Ok(Some(task)) => {
                    tracing::debug!(
                        task_id = task.id,
                        video_id = %task.video_id,
                        "Task claimed",
                    );
                    let processor = Arc::clone(&self.processor);
                    workers.spawn(async move {
                        processor.process(task).await;
                        drop(permit);
                    });
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim processing task");
                    return;
                }
            }
        }
    }

    async fn sweep_stranded(&self) {
        match self.tasks.requeue_stranded(self.config.stranded_after).await {
            Ok(0) => {}
            Ok(requeued) => tracing::warn!(requeued, "Requeued stranded videos"),
            Err(e) => tracing::error!(error = %e, "Stranded video sweep failed"),
        }
    }

    /// Process every runnable task inline, one at a time, and return how
    /// many were handled.
    pub async fn drain(&self) -> usize {
        let mut handled = 0;
        loop {
            match self.tasks.claim(self.config.lease).await {
                Ok(Some(task)) => {
                    self.processor.process(task).await;
                    handled += 1;
                }
                Ok(None) => return handled,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim processing task");
                    return handled;
                }
            }
        }
    }
}
