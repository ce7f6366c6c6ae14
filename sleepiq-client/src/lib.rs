//! Session-managed client for the Sleep Number (SleepIQ) cloud API
//!
//! This crate covers the small part of the SleepIQ REST API needed to drive
//! an adjustable foundation: login with bed discovery, foundation status and
//! foundation presets. Sessions are kept in memory only; a rejected session
//! key triggers exactly one silent re-login per call.
//!
//! ```no_run
//! use sleepiq_client::{Preset, SessionClient, Side};
//!
//! # async fn run() -> sleepiq_client::Result<()> {
//! let client = SessionClient::with_defaults("sleeper@example.com", "secret")?;
//! client.login().await?;
//!
//! let status = client.foundation_status().await?;
//! if !status.is_raised(Side::Left) {
//!     client.set_preset(Side::Left, Preset::RAISED).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod types;

pub use client::{
    ClientConfig, Credentials, Session, SessionClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{ClientError, Result};
pub use types::{BedRef, FoundationStatus, Preset, Side};
