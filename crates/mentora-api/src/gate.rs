//! Join-window gate states

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minutes around a session's start during which it may be joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinWindow {
    pub join_minutes_before: u32,
    pub expire_minutes_after: u32,
}

impl Default for JoinWindow {
    fn default() -> Self {
        Self {
            join_minutes_before: 10,
            expire_minutes_after: 120,
        }
    }
}

/// Why a session can no longer be joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndedReason {
    SessionCompleted,
    SessionMissed,
    WindowClosed,
}

/// Non-timing failure that blocks joining
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GateError {
    /// Join window settings were not available
    MissingSettings,
    /// The session could not be loaded
    SessionUnavailable(String),
    /// Camera/microphone permission was denied
    PermissionDenied(String),
    /// The permission check did not answer in time
    PermissionTimeout,
    /// The live transport failed to initialize
    TransportInit(String),
}

/// Outcome of evaluating whether a session may be joined right now.
///
/// Waiting, Ended and Error stay distinct because the remedy differs: wait,
/// contact support, or fix the cause and retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    /// Inputs not yet evaluated
    Loading,
    /// Too early; countdown until the window opens
    Waiting {
        opens_at: DateTime<Local>,
        countdown: Duration,
    },
    /// Joinable until `closes_at`
    Active { closes_at: DateTime<Local> },
    /// Session over
    Ended { reason: EndedReason },
    /// Technical error, retry after fixing the cause
    Error { error: GateError },
}

impl GateState {
    pub fn is_waiting(&self) -> bool {
        matches!(self, GateState::Waiting { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, GateState::Active { .. })
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, GateState::Ended { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GateState::Error { .. })
    }

    /// Only errors offer a retry
    pub fn can_retry(&self) -> bool {
        self.is_error()
    }
}
