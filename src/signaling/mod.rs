//! Signaling channel
//!
//! The persistent socket used to exchange call setup and teardown messages.
//! One socket exists per authenticated session and it is shared with other
//! features, so consumers subscribe to its frames instead of owning it.

mod socket;

pub use socket::SignalingSocket;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ClientEvent;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalingError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Signaling socket closed")]
    Closed,
    #[error("Encoding error: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for SignalingError {
    fn from(err: serde_json::Error) -> Self {
        SignalingError::Encode(err.to_string())
    }
}

/// Outbound half of the signaling channel as seen by the call orchestrator
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn emit(&self, event: ClientEvent) -> Result<(), SignalingError>;
}
