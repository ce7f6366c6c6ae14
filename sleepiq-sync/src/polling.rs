//! Recurring status poll task
//!
//! Runs a fixed-interval fetch-and-reconcile loop for one foundation in the
//! background. Failed polls are simply retried on the next tick; the loop
//! ends on shutdown or once the foundation is known to be absent.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// Result of one fetch-and-reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Local state was overwritten with the fetched status
    Updated { raised: bool },
    /// The fetch failed; local state is unchanged
    Failed,
    /// The service reported no foundation on this pass
    NoFoundation,
    /// Syncing was already disabled; nothing was fetched
    Disabled,
}

impl PollOutcome {
    /// Whether polling should stop for good after this outcome
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollOutcome::NoFoundation | PollOutcome::Disabled)
    }
}

/// Something that can be polled on a timer
#[async_trait]
pub(crate) trait PollTarget: Send + Sync {
    async fn poll(&self) -> PollOutcome;
}

#[derive(Debug, Default)]
struct PollCounters {
    polls: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
}

/// Statistics for a polling task
#[derive(Debug, Clone)]
pub struct PollingTaskStats {
    pub interval: Duration,
    pub started_at: Instant,
    pub poll_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u64,
    pub is_running: bool,
}

/// Background poll loop with graceful shutdown
#[derive(Debug)]
pub struct PollingTask {
    interval: Duration,
    started_at: Instant,
    counters: Arc<PollCounters>,
    task_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl PollingTask {
    /// Spawn the poll loop; the first poll happens one interval from now
    pub(crate) fn start(target: Arc<dyn PollTarget>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let counters = Arc::new(PollCounters::default());

        let task_handle = tokio::spawn(Self::polling_loop(
            target,
            interval,
            Arc::clone(&counters),
            shutdown_rx,
        ));

        Self {
            interval,
            started_at: Instant::now(),
            counters,
            task_handle: Some(task_handle),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    async fn polling_loop(
        target: Arc<dyn PollTarget>,
        interval: Duration,
        counters: Arc<PollCounters>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!(?interval, "Starting foundation polling");

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    counters.polls.fetch_add(1, Ordering::Relaxed);
                    debug!("Update flex data");

                    let outcome = target.poll().await;
                    match outcome {
                        PollOutcome::Updated { .. } => {
                            counters.consecutive_failures.store(0, Ordering::Relaxed);
                        }
                        PollOutcome::Failed => {
                            counters.failures.fetch_add(1, Ordering::Relaxed);
                            let streak = counters.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                            debug!(consecutive_failures = streak, "Poll failed, retrying next interval");
                        }
                        PollOutcome::NoFoundation | PollOutcome::Disabled => {
                            info!("Foundation sync disabled, stopping polling");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        debug!("Foundation polling ended");
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the task is still running
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> PollingTaskStats {
        PollingTaskStats {
            interval: self.interval,
            started_at: self.started_at,
            poll_count: self.counters.polls.load(Ordering::Relaxed),
            failure_count: self.counters.failures.load(Ordering::Relaxed),
            consecutive_failures: self.counters.consecutive_failures.load(Ordering::Relaxed),
            is_running: self.is_running(),
        }
    }

    /// Signal the loop to stop and wait up to 5 seconds for it
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        let Some(task) = self.task_handle.take() else {
            return Ok(());
        };

        match timeout(Duration::from_secs(5), task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SyncError::Shutdown(format!("Polling task panicked: {e}"))),
            Err(_) => {
                warn!("Polling task did not stop in time");
                Err(SyncError::Shutdown(
                    "Polling task shutdown timed out after 5 seconds".to_string(),
                ))
            }
        }
    }
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}
