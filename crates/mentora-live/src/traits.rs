//! Media permission and live transport traits

use async_trait::async_trait;
use mentora_api::GateError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RoomHandoff;

/// Errors from the live collaborators
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("Media permission denied: {0}")]
    PermissionDenied(String),

    #[error("Media permission check timed out")]
    PermissionTimeout,

    #[error("Transport initialization failed: {0}")]
    TransportInit(String),

    #[error("Grant {0} is not held")]
    UnknownGrant(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LiveError {
    /// The gate error shown to the user for this failure
    pub fn to_gate_error(&self) -> GateError {
        match self {
            LiveError::PermissionDenied(msg) => GateError::PermissionDenied(msg.clone()),
            LiveError::PermissionTimeout => GateError::PermissionTimeout,
            LiveError::TransportInit(msg) => GateError::TransportInit(msg.clone()),
            LiveError::UnknownGrant(_) | LiveError::Internal(_) => {
                GateError::TransportInit(self.to_string())
            }
        }
    }
}

pub type LiveResult<T> = Result<T, LiveError>;

/// Opaque token for an acquired camera/microphone grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaGrant {
    id: u64,
}

impl MediaGrant {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Camera/microphone permission source
#[async_trait]
pub trait MediaPermission: Send + Sync {
    /// Ask for camera and microphone access
    async fn request(&self) -> LiveResult<MediaGrant>;

    /// Give an acquired grant back
    async fn release(&self, grant: MediaGrant) -> LiveResult<()>;
}

/// Live video transport that takes over once a session is Active
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Join the room described by `handoff` using the acquired grant
    async fn hand_off(&self, handoff: &RoomHandoff, grant: &MediaGrant) -> LiveResult<()>;

    /// Optional: check if the transport is reachable
    fn is_healthy(&self) -> bool {
        true
    }
}
