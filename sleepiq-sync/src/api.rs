//! The narrow remote interface the synchronizer depends on

use async_trait::async_trait;
use sleepiq_client::{ClientError, FoundationStatus, Preset, SessionClient, Side};

/// Remote operations needed to drive one foundation
///
/// Implemented by [`SessionClient`]; tests substitute scripted doubles.
#[async_trait]
pub trait FoundationApi: Send + Sync {
    /// Fetch head/foot positions and the moving flag
    async fn foundation_status(&self) -> Result<FoundationStatus, ClientError>;

    /// Issue a numbered preset for one side
    async fn set_preset(&self, side: Side, preset: Preset) -> Result<(), ClientError>;
}

#[async_trait]
impl FoundationApi for SessionClient {
    async fn foundation_status(&self) -> Result<FoundationStatus, ClientError> {
        SessionClient::foundation_status(self).await
    }

    async fn set_preset(&self, side: Side, preset: Preset) -> Result<(), ClientError> {
        SessionClient::set_preset(self, side, preset).await
    }
}
