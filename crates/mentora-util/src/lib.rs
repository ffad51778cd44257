//! Shared utilities for mentora
//!
//! This crate provides:
//! - ID types (BookingId, SessionId, InstructorId, ...)
//! - Error types shared by every layer
//! - Money in integral minor units
//! - Time utilities (mock-able wall clock, HH:MM parsing, countdowns)
//! - Default paths for config and data directories

mod error;
mod ids;
mod money;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use money::*;
pub use paths::*;
pub use time::*;
