//! Store trait definitions

use chrono::{DateTime, Local};
use mentora_api::{
    AvailabilitySet, Booking, BookingStatus, Instructor, OrderStatus, Payout, ProfileChange,
    ProgressNote, ScheduledSession, ServiceOrder, SessionStatus,
};
use mentora_util::{BookingId, InstructorId, OrderId, SessionId};

use crate::{AuditEvent, StoreResult};

/// Main store trait.
///
/// Every status-changing write takes the status the caller last observed and
/// fails with `StoreError::Conflict` if the row has moved on.
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Bookings

    fn insert_booking(&self, booking: &Booking) -> StoreResult<()>;

    fn get_booking(&self, id: &BookingId) -> StoreResult<Option<Booking>>;

    fn list_bookings(&self) -> StoreResult<Vec<Booking>>;

    /// Move a booking from `expected` to `next`
    fn transition_booking(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> StoreResult<()>;

    /// Store a receipt reference while the booking is still in `expected`
    fn set_receipt(&self, id: &BookingId, expected: BookingStatus, receipt: &str) -> StoreResult<()>;

    /// Assign an instructor while the booking is still in `expected`
    fn assign_instructor(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        instructor_id: &InstructorId,
    ) -> StoreResult<()>;

    fn add_progress_note(&self, id: &BookingId, note: &ProgressNote) -> StoreResult<()>;

    /// Confirm a booking and reserve its sessions as one unit.
    ///
    /// Nothing is written if the status moved or any slot is already taken.
    fn confirm_booking(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        sessions: &[ScheduledSession],
    ) -> StoreResult<()>;

    /// Cancel a booking and delete its upcoming sessions.
    ///
    /// Upcoming rows are removed outright rather than kept with a cancelled
    /// status, so session listings no longer show them; Completed and Missed
    /// rows stay. Returns how many sessions were removed.
    fn cancel_booking(&self, id: &BookingId, expected: BookingStatus) -> StoreResult<usize>;

    // Sessions

    /// Reserve a single slot; fails with a conflict if the instructor is taken
    fn insert_session(&self, session: &ScheduledSession) -> StoreResult<()>;

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<ScheduledSession>>;

    /// Sessions of a booking, earliest first
    fn sessions_for_booking(&self, booking_id: &BookingId) -> StoreResult<Vec<ScheduledSession>>;

    /// Sessions of an instructor, earliest first
    fn sessions_for_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> StoreResult<Vec<ScheduledSession>>;

    fn transition_session(
        &self,
        id: &SessionId,
        expected: SessionStatus,
        next: SessionStatus,
    ) -> StoreResult<()>;

    /// Move an upcoming session to a new start time, checking the slot atomically
    fn reschedule_session(&self, id: &SessionId, starts_at: DateTime<Local>) -> StoreResult<()>;

    /// Mark every upcoming session that started before `cutoff` as missed.
    ///
    /// Returns the sessions that changed, with their new status.
    fn mark_overdue_missed(&self, cutoff: DateTime<Local>) -> StoreResult<Vec<ScheduledSession>>;

    // Instructors

    /// Insert unless a record with the same id exists; returns whether it was inserted
    fn insert_instructor_if_absent(&self, instructor: &Instructor) -> StoreResult<bool>;

    fn get_instructor(&self, id: &InstructorId) -> StoreResult<Option<Instructor>>;

    fn list_instructors(&self) -> StoreResult<Vec<Instructor>>;

    /// Fill the empty pending-schedule slot
    fn propose_schedule(&self, id: &InstructorId, proposal: &AvailabilitySet) -> StoreResult<()>;

    /// Replace availability with the pending proposal
    fn approve_schedule(&self, id: &InstructorId) -> StoreResult<Instructor>;

    /// Discard the pending proposal
    fn reject_schedule(&self, id: &InstructorId) -> StoreResult<Instructor>;

    /// Fill the empty pending-profile slot
    fn propose_profile(&self, id: &InstructorId, change: &ProfileChange) -> StoreResult<()>;

    /// Merge the pending profile change into the live fields
    fn approve_profile(&self, id: &InstructorId) -> StoreResult<Instructor>;

    fn reject_profile(&self, id: &InstructorId) -> StoreResult<Instructor>;

    // Ledger

    fn insert_payout(&self, payout: &Payout) -> StoreResult<()>;

    fn payouts_for_instructor(&self, instructor_id: &InstructorId) -> StoreResult<Vec<Payout>>;

    // Service orders

    fn insert_order(&self, order: &ServiceOrder) -> StoreResult<()>;

    fn get_order(&self, id: &OrderId) -> StoreResult<Option<ServiceOrder>>;

    fn orders_for_instructor(&self, instructor_id: &InstructorId)
        -> StoreResult<Vec<ServiceOrder>>;

    fn transition_order(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
