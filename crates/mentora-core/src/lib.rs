//! Booking-to-session lifecycle engine for mentora
//!
//! This crate is the heart of mentora, containing:
//! - Booking state machine (AwaitingPayment -> Confirmed -> Completed, or Cancelled)
//! - Session scheduling against approved availability, with reconciliation of missed sessions
//! - Schedule and profile approval workflows
//! - The pure join-window gate
//! - Instructor settlement derived from completed work and the payout ledger

mod approvals;
mod engine;
mod events;
mod gate;
mod sessions;
mod settlement;

pub use engine::*;
pub use events::*;
pub use gate::*;
pub use settlement::*;
