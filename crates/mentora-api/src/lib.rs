//! Domain types for mentora
//!
//! This crate defines the vocabulary shared by every layer:
//! - Closed status enums with their display labels
//! - Booking, session, instructor, payout and order records
//! - Availability slot sets
//! - Actors and what each role may do
//! - Join-window gate states
//! - Package catalog helpers (session-count parsing)

mod actor;
mod availability;
mod catalog;
mod gate;
mod status;
mod types;

pub use actor::*;
pub use availability::*;
pub use catalog::*;
pub use gate::*;
pub use status::*;
pub use types::*;
