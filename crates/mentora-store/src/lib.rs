//! Persistence layer for mentora
//!
//! Provides:
//! - Bookings and scheduled sessions with compare-and-swap status transitions
//! - Atomic slot reservation (collision check and insert in one transaction)
//! - Instructor records with single-pending approval slots
//! - Payout ledger and service orders
//! - Audit log (append-only)

mod audit;
mod sqlite;
mod traits;

pub use audit::*;
pub use sqlite::*;
pub use traits::*;

use mentora_util::MentoraError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A guarded write found a different state than the caller expected
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for MentoraError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => MentoraError::NotFound(msg),
            StoreError::Conflict(msg) => MentoraError::Conflict(msg),
            other => MentoraError::store(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
