//! Local belief about the physical foundation

use sleepiq_client::{FoundationStatus, Side};
use tokio::time::Instant;

/// Whether the bed has foundation hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capability {
    /// Nothing fetched yet
    #[default]
    Unknown,
    Present,
    /// The service reported no foundation; syncing is disabled for good
    Absent,
}

/// Where the current `raised` value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateSource {
    #[default]
    Initial,
    /// Derived from a status fetch
    Polled,
    /// Optimistic echo of a requested target
    Commanded,
}

/// The synchronizer's view of the foundation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FoundationState {
    pub raised: bool,
    pub head_position: i32,
    pub foot_position: i32,
    pub moving: bool,
    pub capability: Capability,
    pub source: StateSource,
    pub updated_at: Option<Instant>,
    /// Last value the device itself reported or acknowledged
    pub device_raised: bool,
    /// Host requests echoed so far
    pub requests: u64,
}

impl FoundationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_supported(&self) -> bool {
        self.capability != Capability::Absent
    }

    /// Overwrite with a freshly fetched status for one side
    pub(crate) fn apply_status(&mut self, status: &FoundationStatus, side: Side, now: Instant) {
        self.head_position = status.head_position(side);
        self.foot_position = status.foot_position(side);
        self.moving = status.is_moving;
        self.raised = status.is_raised(side);
        self.device_raised = self.raised;
        self.capability = Capability::Present;
        self.source = StateSource::Polled;
        self.updated_at = Some(now);
    }

    /// Echo a host request, returning the previous value
    pub(crate) fn apply_command(&mut self, target: bool, now: Instant) -> bool {
        let previous = self.raised;
        self.raised = target;
        self.requests += 1;
        self.source = StateSource::Commanded;
        self.updated_at = Some(now);
        previous
    }

    /// Record an acknowledged preset.
    ///
    /// The echo is refreshed only when no host request arrived after
    /// `requests_at_send`; returns the previous value when it was.
    pub(crate) fn confirm_command(
        &mut self,
        target: bool,
        requests_at_send: u64,
        now: Instant,
    ) -> Option<bool> {
        self.device_raised = target;
        if self.requests != requests_at_send {
            return None;
        }

        let previous = self.raised;
        self.raised = target;
        self.source = StateSource::Commanded;
        self.updated_at = Some(now);
        Some(previous)
    }

    pub(crate) fn mark_absent(&mut self, now: Instant) {
        self.capability = Capability::Absent;
        self.moving = false;
        self.updated_at = Some(now);
    }
}

/// Receives the latest raised/flat value for the host to display
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, raised: bool);
}

impl<F> StateObserver for F
where
    F: Fn(bool) + Send + Sync,
{
    fn state_changed(&self, raised: bool) {
        self(raised)
    }
}
