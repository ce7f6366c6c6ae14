//! Error types for the sleepiq-sync crate.

/// Errors raised by the synchronizer itself.
///
/// Remote failures never show up here: they are handled at the synchronizer
/// boundary and turned into log events and no-op outcomes.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A background task could not be stopped cleanly
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Convenience type alias for Results using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;
