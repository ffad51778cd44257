//! Audit event types

use chrono::{DateTime, Local};
use mentora_api::Actor;
use mentora_util::{
    BookingId, GuardianId, InstructorId, Money, OrderId, PackageId, PayoutId, ServiceId, SessionId,
};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Settings loaded
    SettingsLoaded {
        package_count: usize,
        instructor_count: usize,
    },

    /// Instructor inserted from config
    InstructorSeeded { instructor_id: InstructorId },

    BookingCreated {
        booking_id: BookingId,
        guardian_id: GuardianId,
        package_id: PackageId,
    },

    ReceiptAttached { booking_id: BookingId, actor: Actor },

    InstructorAssigned {
        booking_id: BookingId,
        instructor_id: InstructorId,
        actor: Actor,
    },

    /// Payment verified and sessions generated
    PaymentVerified {
        booking_id: BookingId,
        actor: Actor,
        session_count: usize,
    },

    /// Derived completion once every session is done
    BookingCompleted { booking_id: BookingId },

    BookingCancelled {
        booking_id: BookingId,
        actor: Actor,
        removed_sessions: usize,
    },

    ProgressNoteAdded { booking_id: BookingId, actor: Actor },

    SessionScheduled {
        session_id: SessionId,
        booking_id: BookingId,
        starts_at: DateTime<Local>,
        actor: Actor,
    },

    SessionRescheduled {
        session_id: SessionId,
        from: DateTime<Local>,
        to: DateTime<Local>,
        actor: Actor,
    },

    SessionCompleted {
        session_id: SessionId,
        booking_id: BookingId,
        actor: Actor,
        overrode_missed: bool,
    },

    /// Written by reconciliation
    SessionMissed {
        session_id: SessionId,
        booking_id: BookingId,
        starts_at: DateTime<Local>,
    },

    ScheduleProposed {
        instructor_id: InstructorId,
        slot_count: usize,
    },

    ScheduleApproved {
        instructor_id: InstructorId,
        actor: Actor,
    },

    ScheduleRejected {
        instructor_id: InstructorId,
        actor: Actor,
    },

    ProfileProposed { instructor_id: InstructorId },

    ProfileApproved {
        instructor_id: InstructorId,
        actor: Actor,
    },

    ProfileRejected {
        instructor_id: InstructorId,
        actor: Actor,
    },

    PayoutRecorded {
        payout_id: PayoutId,
        instructor_id: InstructorId,
        amount: Money,
        actor: Actor,
    },

    OrderCreated {
        order_id: OrderId,
        service_id: ServiceId,
        instructor_id: InstructorId,
    },

    OrderCompleted { order_id: OrderId, actor: Actor },

    OrderCancelled { order_id: OrderId, actor: Actor },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: mentora_util::now(),
            event,
        }
    }
}
