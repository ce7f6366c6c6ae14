//! The foundation synchronizer
//!
//! Bridges a host that thinks in terms of a single raised/flat switch to a
//! foundation that is driven through numbered presets. Requests from the host
//! are echoed locally right away and handed to a background worker that runs
//! them through the [`Debouncer`]; a separate [`PollingTask`] keeps the local
//! state aligned with the device.

use async_trait::async_trait;
use parking_lot::Mutex;
use sleepiq_client::{ClientError, Preset};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::api::FoundationApi;
use crate::config::SyncConfig;
use crate::debounce::{Debouncer, Dispatch};
use crate::error::{Result, SyncError};
use crate::polling::{PollOutcome, PollTarget, PollingTask};
use crate::state::{FoundationState, StateObserver};

/// How a wait for the foundation to stop moving ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementOutcome {
    /// A fetch reported the foundation at rest
    Stopped { fetches: u32 },
    /// The service reported no foundation
    NoFoundation,
    /// Still moving (or unreachable) when the wait limit ran out
    TimedOut { fetches: u32 },
}

/// A host request on its way to the command worker
#[derive(Debug, Clone, Copy)]
struct Intent {
    target: bool,
    /// Last value the device reported or acknowledged
    device_value: bool,
    requested_at: Instant,
}

struct Shared<A> {
    api: Arc<A>,
    config: SyncConfig,
    state: Mutex<FoundationState>,
    observer: Arc<dyn StateObserver>,
}

impl<A: FoundationApi> Shared<A> {
    fn is_supported(&self) -> bool {
        self.state.lock().is_supported()
    }

    fn notify(&self, raised: bool) {
        self.observer.state_changed(raised);
    }

    fn disable(&self) {
        let newly_absent = {
            let mut state = self.state.lock();
            let was_supported = state.is_supported();
            state.mark_absent(Instant::now());
            was_supported
        };

        if newly_absent {
            warn!(side = %self.config.side, "No foundation detected, disabling foundation sync");
        }
    }

    fn log_remote_failure(&self, err: &ClientError, action: &str) {
        if err.is_auth() {
            error!(error = %err, "Failed to {action}: not authenticated");
        } else {
            warn!(error = %err, transient = err.is_transient(), "Failed to {action}");
        }
    }

    async fn poll_once(&self) -> PollOutcome {
        if !self.is_supported() {
            return PollOutcome::Disabled;
        }

        match self.api.foundation_status().await {
            Ok(status) => {
                let snapshot = {
                    let mut state = self.state.lock();
                    if !state.is_supported() {
                        return PollOutcome::Disabled;
                    }
                    state.apply_status(&status, self.config.side, Instant::now());
                    state.clone()
                };

                debug!(
                    raised = snapshot.raised,
                    head = snapshot.head_position,
                    foot = snapshot.foot_position,
                    moving = snapshot.moving,
                    "Foundation status"
                );
                self.notify(snapshot.raised);
                PollOutcome::Updated {
                    raised: snapshot.raised,
                }
            }
            Err(e) if e.is_no_foundation() => {
                self.disable();
                PollOutcome::NoFoundation
            }
            Err(e) => {
                self.log_remote_failure(&e, "fetch foundation status");
                PollOutcome::Failed
            }
        }
    }

    async fn wait_for_stop(&self) -> MovementOutcome {
        if !self.is_supported() {
            return MovementOutcome::NoFoundation;
        }

        let interval = self.config.movement_poll_interval;
        let limit = self.config.movement_wait_limit;
        let started = Instant::now();
        let mut fetches = 0u32;

        loop {
            fetches += 1;
            match self.api.foundation_status().await {
                Ok(status) => {
                    self.state
                        .lock()
                        .apply_status(&status, self.config.side, Instant::now());
                    if !status.is_moving {
                        debug!(fetches, "Foundation stopped moving");
                        return MovementOutcome::Stopped { fetches };
                    }
                    debug!(fetches, "Foundation is still moving");
                }
                Err(e) if e.is_no_foundation() => {
                    self.disable();
                    return MovementOutcome::NoFoundation;
                }
                Err(e) => {
                    warn!(error = %e, fetches, "Status fetch failed while waiting for the foundation to stop");
                }
            }

            if started.elapsed() + interval > limit {
                warn!(fetches, ?limit, "Gave up waiting for the foundation to stop moving");
                return MovementOutcome::TimedOut { fetches };
            }

            sleep(interval).await;
        }
    }

    async fn issue(&self, dispatch: Dispatch) {
        if !self.is_supported() {
            debug!(raised = dispatch.target, "Foundation sync disabled, dropping command");
            return;
        }

        if self.config.await_movement_before_command
            && self.wait_for_stop().await == MovementOutcome::NoFoundation
        {
            return;
        }

        let side = self.config.side;
        let preset = Preset::for_target(dispatch.target);
        info!(%side, %preset, edge = ?dispatch.edge, raised = dispatch.target, "Set foundation preset");

        let requests_at_send = self.state.lock().requests;
        match self.api.set_preset(side, preset).await {
            Ok(()) => {
                let echoed = self.state.lock().confirm_command(
                    dispatch.target,
                    requests_at_send,
                    Instant::now(),
                );
                if echoed.is_some_and(|previous| previous != dispatch.target) {
                    self.notify(dispatch.target);
                }
            }
            Err(e) if e.is_no_foundation() => self.disable(),
            Err(e) => self.log_remote_failure(&e, "set foundation preset"),
        }
    }

    async fn command_loop(self: Arc<Self>, mut command_rx: mpsc::UnboundedReceiver<Intent>) {
        let mut debouncer = Debouncer::new(self.config.debounce_window, self.config.leading_edge);

        loop {
            let deadline = debouncer.deadline();

            tokio::select! {
                intent = command_rx.recv() => {
                    let Some(intent) = intent else {
                        break;
                    };

                    // A window that expired while this request was queued closes first
                    if let Some(dispatch) = debouncer.poll(intent.requested_at) {
                        self.issue(dispatch).await;
                    }
                    if let Some(dispatch) =
                        debouncer.request(intent.target, intent.device_value, intent.requested_at)
                    {
                        self.issue(dispatch).await;
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(dispatch) = debouncer.poll(Instant::now()) {
                        self.issue(dispatch).await;
                    }
                }
            }
        }

        // Flush the trailing send of a window still open at shutdown
        if let Some(deadline) = debouncer.deadline() {
            if let Some(dispatch) = debouncer.poll(deadline) {
                self.issue(dispatch).await;
            }
        }

        debug!("Foundation command worker ended");
    }
}

#[async_trait]
impl<A: FoundationApi> PollTarget for Shared<A> {
    async fn poll(&self) -> PollOutcome {
        self.poll_once().await
    }
}

/// Keeps one foundation and the host's raised/flat switch in step
///
/// Must be created inside a Tokio runtime: construction spawns the command
/// worker.
pub struct FoundationSynchronizer<A: FoundationApi + 'static> {
    shared: Arc<Shared<A>>,
    command_tx: mpsc::UnboundedSender<Intent>,
    command_task: JoinHandle<()>,
    polling: Option<PollingTask>,
}

impl<A: FoundationApi + 'static> FoundationSynchronizer<A> {
    /// Create a synchronizer for `api`, reporting state changes to `observer`
    pub fn new(api: Arc<A>, config: SyncConfig, observer: Arc<dyn StateObserver>) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            api,
            config,
            state: Mutex::new(FoundationState::new()),
            observer,
        });

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let command_task = tokio::spawn(Arc::clone(&shared).command_loop(command_rx));

        Ok(Self {
            shared,
            command_tx,
            command_task,
            polling: None,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Ask for the foundation to be raised (`true`) or flat (`false`).
    ///
    /// The target is echoed into local state and reported to the observer
    /// immediately; the preset itself goes out through the debounce window.
    /// Does nothing once the foundation is known to be absent.
    pub fn request_state(&self, target: bool) {
        let now = Instant::now();
        let (previous, device_value) = {
            let mut state = self.shared.state.lock();
            if !state.is_supported() {
                debug!(raised = target, "Foundation sync disabled, ignoring request");
                return;
            }
            (state.apply_command(target, now), state.device_raised)
        };

        debug!(raised = target, device_raised = device_value, "Set foundation requested");
        if previous != target {
            self.shared.notify(target);
        }

        let intent = Intent {
            target,
            device_value,
            requested_at: now,
        };
        if self.command_tx.send(intent).is_err() {
            warn!(raised = target, "Foundation command worker is gone, request dropped");
        }
    }

    /// The current raised/flat belief; never touches the network
    pub fn current_state(&self) -> bool {
        self.shared.state.lock().raised
    }

    pub fn state(&self) -> FoundationState {
        self.shared.state.lock().clone()
    }

    /// False once the service has reported that the bed has no foundation
    pub fn is_supported(&self) -> bool {
        self.shared.is_supported()
    }

    /// Fetch the status once and reconcile local state with it
    pub async fn poll_once(&self) -> PollOutcome {
        self.shared.poll_once().await
    }

    /// Poll until the foundation reports it is no longer moving
    pub async fn wait_for_stop(&self) -> MovementOutcome {
        self.shared.wait_for_stop().await
    }

    /// Start the recurring status poll; a no-op if it is already running
    pub fn start_polling(&mut self) {
        if self.polling.as_ref().is_some_and(PollingTask::is_running) {
            return;
        }

        let target: Arc<dyn PollTarget> = self.shared.clone();
        self.polling = Some(PollingTask::start(target, self.shared.config.poll_interval));
    }

    pub fn polling_task(&self) -> Option<&PollingTask> {
        self.polling.as_ref()
    }

    /// Stop polling, flush any pending command and wait for the worker
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            command_tx,
            command_task,
            polling,
            ..
        } = self;

        if let Some(polling) = polling {
            polling.shutdown().await?;
        }

        drop(command_tx);
        match timeout(Duration::from_secs(5), command_task).await {
            Ok(Ok(())) => {
                info!("Foundation synchronizer stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(SyncError::Shutdown(format!("Command worker panicked: {e}"))),
            Err(_) => Err(SyncError::Shutdown(
                "Command worker shutdown timed out after 5 seconds".to_string(),
            )),
        }
    }
}
