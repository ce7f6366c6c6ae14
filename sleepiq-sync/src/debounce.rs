//! Debounce state machine for foundation commands
//!
//! A window opens with the first request after an idle period and stays open
//! for a fixed duration; later requests only replace the pending target and
//! never extend the window. A send happens at most twice per window:
//!
//! - leading edge: when the window opens, if the target differs from the
//!   value already on the device (and leading sends are enabled);
//! - trailing edge: when the window closes, if the last requested target
//!   differs from the last value sent. In trailing-only mode nothing is known
//!   to have been sent, so the trailing edge always fires.
//!
//! The machine is pure: callers pass the current instant in, which keeps it
//! independent of any timer.

use std::time::Duration;
use tokio::time::Instant;

/// The most recent user intent inside a debounce window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub target: bool,
    pub requested_at: Instant,
}

/// Which edge of the window produced a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Leading,
    Trailing,
}

/// A command the caller must forward to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub target: bool,
    pub edge: Edge,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Debouncing {
        opened_at: Instant,
        pending: PendingCommand,
        last_sent: Option<bool>,
    },
}

/// Leading/trailing debouncer over a boolean target
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    leading_edge: bool,
    phase: Phase,
}

impl Debouncer {
    pub fn new(window: Duration, leading_edge: bool) -> Self {
        Self {
            window,
            leading_edge,
            phase: Phase::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn pending(&self) -> Option<PendingCommand> {
        match self.phase {
            Phase::Idle => None,
            Phase::Debouncing { pending, .. } => Some(pending),
        }
    }

    /// When the open window closes, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::Debouncing { opened_at, .. } => Some(opened_at + self.window),
        }
    }

    /// Record a request.
    ///
    /// `device_value` is the last value known to be on the device; it only
    /// matters when this request opens a new window.
    pub fn request(&mut self, target: bool, device_value: bool, now: Instant) -> Option<Dispatch> {
        let pending = PendingCommand {
            target,
            requested_at: now,
        };

        if let Phase::Debouncing { pending: slot, .. } = &mut self.phase {
            *slot = pending;
            return None;
        }

        if !self.leading_edge {
            self.phase = Phase::Debouncing {
                opened_at: now,
                pending,
                last_sent: None,
            };
            return None;
        }

        let fire = target != device_value;
        self.phase = Phase::Debouncing {
            opened_at: now,
            pending,
            last_sent: Some(if fire { target } else { device_value }),
        };

        fire.then_some(Dispatch {
            target,
            edge: Edge::Leading,
        })
    }

    /// Close the window if it has elapsed by `now`, returning the trailing
    /// send when the final target differs from what was last sent.
    pub fn poll(&mut self, now: Instant) -> Option<Dispatch> {
        let Phase::Debouncing {
            opened_at,
            pending,
            last_sent,
        } = self.phase
        else {
            return None;
        };

        if now < opened_at + self.window {
            return None;
        }

        self.phase = Phase::Idle;
        (last_sent != Some(pending.target)).then_some(Dispatch {
            target: pending.target,
            edge: Edge::Trailing,
        })
    }
}
