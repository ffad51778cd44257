//! Core events emitted by the engine

use chrono::{DateTime, Local};
use mentora_api::OrderStatus;
use mentora_util::{BookingId, GuardianId, InstructorId, Money, OrderId, PackageId, SessionId};
use serde::Serialize;

/// Events emitted by the lifecycle engine for the notification layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    BookingCreated {
        booking_id: BookingId,
        guardian_id: GuardianId,
        package_id: PackageId,
    },

    /// Payment verified and every package session placed
    BookingConfirmed {
        booking_id: BookingId,
        session_count: usize,
        first_session: Option<DateTime<Local>>,
    },

    /// Every session done; derived, never requested
    BookingCompleted { booking_id: BookingId },

    BookingCancelled {
        booking_id: BookingId,
        removed_sessions: usize,
    },

    SessionScheduled {
        session_id: SessionId,
        booking_id: BookingId,
        starts_at: DateTime<Local>,
    },

    SessionRescheduled {
        session_id: SessionId,
        booking_id: BookingId,
        starts_at: DateTime<Local>,
    },

    SessionCompleted {
        session_id: SessionId,
        booking_id: BookingId,
    },

    /// Promoted by reconciliation
    SessionMissed {
        session_id: SessionId,
        booking_id: BookingId,
        starts_at: DateTime<Local>,
    },

    ScheduleProposed { instructor_id: InstructorId },

    ScheduleReviewed {
        instructor_id: InstructorId,
        approved: bool,
    },

    ProfileProposed { instructor_id: InstructorId },

    ProfileReviewed {
        instructor_id: InstructorId,
        approved: bool,
    },

    PayoutRecorded {
        instructor_id: InstructorId,
        amount: Money,
    },

    OrderUpdated {
        order_id: OrderId,
        status: OrderStatus,
    },
}
