//! Keep a Sleep Number foundation in step with a raised/flat switch
//!
//! This crate sits between a host (a smart-home bridge, a CLI) and the
//! [`sleepiq_client::SessionClient`]:
//!
//! - [`FoundationSynchronizer::request_state`] echoes the requested value
//!   locally and forwards it through a debounce window, so a burst of toggles
//!   becomes at most one leading and one trailing preset.
//! - A background poll refreshes the local state on a fixed interval and
//!   reports it through a [`StateObserver`].
//! - [`FoundationSynchronizer::wait_for_stop`] polls until the foundation is
//!   at rest.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sleepiq_client::SessionClient;
//! use sleepiq_sync::{FoundationSynchronizer, SyncConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(SessionClient::with_defaults("me@example.com", "secret")?);
//! client.login().await?;
//!
//! let observer = Arc::new(|raised: bool| println!("raised: {raised}"));
//! let mut sync = FoundationSynchronizer::new(client, SyncConfig::default(), observer)?;
//! sync.start_polling();
//!
//! sync.request_state(true);
//! assert!(sync.current_state());
//!
//! sync.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod polling;
pub mod state;
pub mod synchronizer;

pub use api::FoundationApi;
pub use config::SyncConfig;
pub use debounce::{Debouncer, Dispatch, Edge, PendingCommand};
pub use error::{Result, SyncError};
pub use polling::{PollOutcome, PollingTask, PollingTaskStats};
pub use state::{Capability, FoundationState, StateObserver, StateSource};
pub use synchronizer::{FoundationSynchronizer, MovementOutcome};
