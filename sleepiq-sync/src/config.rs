//! Configuration types for the sleepiq-sync crate
//!
//! This module defines the settings that control the synchronizer: the
//! debounce window for commands, the status polling cadence and the bounds
//! of the wait-until-stopped loop.

use sleepiq_client::Side;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::SyncError;

/// Configuration for a FoundationSynchronizer
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Window during which repeated requests are coalesced
    /// Default: 5 seconds
    pub debounce_window: Duration,

    /// Send the first request of an idle window immediately
    /// Default: true
    pub leading_edge: bool,

    /// Interval of the recurring status poll
    /// Default: 10 seconds
    pub poll_interval: Duration,

    /// Interval between status fetches while waiting for movement to stop
    /// Default: 500 milliseconds
    pub movement_poll_interval: Duration,

    /// Give up waiting for movement to stop after this long
    /// Default: 60 seconds
    pub movement_wait_limit: Duration,

    /// Wait for the foundation to stop moving before issuing a preset
    /// Default: false
    pub await_movement_before_command: bool,

    /// Side of the bed that presets target and positions are read from
    /// Default: Side::Left
    pub side: Side,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_secs(5),
            leading_edge: true,
            poll_interval: Duration::from_secs(10),
            movement_poll_interval: Duration::from_millis(500),
            movement_wait_limit: Duration::from_secs(60),
            await_movement_before_command: false,
            side: Side::Left,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a SyncConfig from the `sendDelay` setting, given in seconds
    pub fn from_send_delay_secs(send_delay: f64) -> Result<Self, SyncError> {
        if !send_delay.is_finite() || send_delay <= 0.0 {
            return Err(SyncError::Configuration(format!(
                "sendDelay must be a positive number of seconds, got {}",
                send_delay
            )));
        }

        let window = Duration::try_from_secs_f64(send_delay).map_err(|_| {
            SyncError::Configuration(format!("sendDelay is out of range: {}", send_delay))
        })?;
        let config = Self::default().with_debounce_window(window);
        config.validate()?;
        Ok(config)
    }

    /// Create a SyncConfig that reacts and refreshes faster
    pub fn responsive() -> Self {
        Self {
            debounce_window: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Create a SyncConfig that only sends at the end of each window
    pub fn trailing_only() -> Self {
        Self {
            leading_edge: false,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.debounce_window.is_zero() {
            return Err(SyncError::Configuration(
                "Debounce window must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(SyncError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.movement_poll_interval.is_zero() {
            return Err(SyncError::Configuration(
                "Movement poll interval must be greater than 0".to_string(),
            ));
        }

        let durations = [
            ("Debounce window", self.debounce_window),
            ("Poll interval", self.poll_interval),
            ("Movement wait limit", self.movement_wait_limit),
        ];
        for (name, duration) in durations {
            if Instant::now().checked_add(duration).is_none() {
                return Err(SyncError::Configuration(format!(
                    "{} is too large: {:?}",
                    name, duration
                )));
            }
        }

        if self.movement_poll_interval >= self.movement_wait_limit {
            return Err(SyncError::Configuration(
                "Invalid movement wait: poll interval must be less than the wait limit"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_leading_edge(mut self, enabled: bool) -> Self {
        self.leading_edge = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_movement_wait(mut self, poll_interval: Duration, limit: Duration) -> Self {
        self.movement_poll_interval = poll_interval;
        self.movement_wait_limit = limit;
        self
    }

    pub fn with_await_movement(mut self, enabled: bool) -> Self {
        self.await_movement_before_command = enabled;
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }
}
