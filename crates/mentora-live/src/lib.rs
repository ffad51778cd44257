//! Live session plumbing for mentora
//!
//! This crate defines the interface between the join-window gate and the
//! outside world: the media permission check and the live video transport.
//! It contains no vendor code itself; the cooperative [`JoinController`]
//! drives a session view from Waiting to Active against those traits.

mod controller;
mod handoff;
mod mock;
mod traits;

pub use controller::*;
pub use handoff::*;
pub use mock::*;
pub use traits::*;
