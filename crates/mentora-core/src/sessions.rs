//! Scheduler: session placement, completion and reconciliation

use chrono::{DateTime, Duration, Local};
use mentora_api::{
    Actor, Booking, BookingStatus, GateState, Instructor, ScheduledSession, SessionStatus,
};
use mentora_store::{AuditEventType, StoreError};
use mentora_util::{minutes, BookingId, InstructorId, MentoraError, Result, SessionId};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::engine::check_booking_status;
use crate::{evaluate_gate, CoreEvent, LifecycleEngine};

impl LifecycleEngine {
    /// Verify a booking's payment: confirm it and place every package session.
    ///
    /// Sessions go on the earliest free approved slots after `now` within the
    /// scheduling horizon. Confirmation and placement commit together; if not
    /// every session fits, nothing changes. `expected` is the booking status
    /// the verifier last saw.
    pub fn verify_payment(
        &self,
        actor: &Actor,
        id: &BookingId,
        expected: BookingStatus,
        now: DateTime<Local>,
    ) -> Result<Vec<ScheduledSession>> {
        if !actor.role().can_verify_payment() {
            return Err(MentoraError::permission("only staff may verify payments"));
        }

        let booking = self.load_booking(id)?;
        check_booking_status(&booking, expected)?;
        if booking.status != BookingStatus::AwaitingPayment {
            return Err(MentoraError::conflict(format!(
                "booking {} is {}, only bookings awaiting payment can be confirmed",
                id,
                booking.status.as_tag()
            )));
        }

        let Some(instructor_id) = booking.instructor_id.clone() else {
            return Err(MentoraError::validation(format!(
                "booking {} has no assigned instructor",
                id
            )));
        };

        let count = self.package(&booking.package_id)?.session_count;
        let instructor = self.load_instructor(&instructor_id)?;
        let sessions = self.plan_sessions(&booking, &instructor, count, now)?;

        self.store.confirm_booking(id, expected, &sessions)?;

        self.audit(AuditEventType::PaymentVerified {
            booking_id: *id,
            actor: actor.clone(),
            session_count: sessions.len(),
        });
        info!(
            booking_id = %id,
            instructor_id = %instructor_id,
            sessions = sessions.len(),
            "Payment verified, booking confirmed"
        );
        self.emit(CoreEvent::BookingConfirmed {
            booking_id: *id,
            session_count: sessions.len(),
            first_session: sessions.first().map(|s| s.starts_at),
        });

        Ok(sessions)
    }

    fn plan_sessions(
        &self,
        booking: &Booking,
        instructor: &Instructor,
        count: u32,
        now: DateTime<Local>,
    ) -> Result<Vec<ScheduledSession>> {
        if instructor.availability.is_empty() {
            return Err(MentoraError::validation(format!(
                "instructor {} has no approved availability",
                instructor.id
            )));
        }

        let taken = self.taken_slots(&instructor.id)?;
        let horizon_days = self.settings().service.scheduling_horizon_days;
        let until = now + Duration::days(i64::from(horizon_days));

        let sessions: Vec<ScheduledSession> = instructor
            .availability
            .occurrences(now, until)
            .into_iter()
            .filter(|at| !taken.contains(&at.timestamp()))
            .take(count as usize)
            .map(|at| ScheduledSession::new(booking, instructor.id.clone(), at))
            .collect();

        if sessions.len() < count as usize {
            return Err(MentoraError::validation(format!(
                "only {} of {} sessions fit in the next {} days of instructor {}'s approved availability",
                sessions.len(),
                count,
                horizon_days,
                instructor.id
            )));
        }

        debug!(booking_id = %booking.id, planned = sessions.len(), "Sessions planned");
        Ok(sessions)
    }

    fn taken_slots(&self, instructor_id: &InstructorId) -> Result<HashSet<i64>> {
        Ok(self
            .store
            .sessions_for_instructor(instructor_id)?
            .iter()
            .filter(|s| s.status == SessionStatus::Upcoming)
            .map(|s| s.starts_at.timestamp())
            .collect())
    }

    /// A start time must be in the future and in the approved slot set
    fn check_slot(
        &self,
        instructor: &Instructor,
        starts_at: &DateTime<Local>,
        now: DateTime<Local>,
    ) -> Result<()> {
        if *starts_at <= now {
            return Err(MentoraError::validation(
                "sessions can only be placed in the future",
            ));
        }
        if !instructor.availability.permits(starts_at) {
            return Err(MentoraError::validation(format!(
                "{} is not in instructor {}'s approved availability",
                starts_at.format("%Y-%m-%d %H:%M"),
                instructor.id
            )));
        }
        Ok(())
    }

    /// Add a make-up session to a confirmed booking
    pub fn schedule_session(
        &self,
        actor: &Actor,
        booking_id: &BookingId,
        starts_at: DateTime<Local>,
        now: DateTime<Local>,
    ) -> Result<ScheduledSession> {
        if !actor.role().can_schedule_sessions() {
            return Err(MentoraError::permission(
                "only staff may schedule additional sessions",
            ));
        }

        let booking = self.load_booking(booking_id)?;
        if booking.status != BookingStatus::Confirmed {
            return Err(MentoraError::conflict(format!(
                "booking {} is {}, sessions are added only to confirmed bookings",
                booking_id,
                booking.status.as_tag()
            )));
        }

        let instructor_id = booking.instructor_id.clone().ok_or_else(|| {
            MentoraError::validation(format!("booking {} has no assigned instructor", booking_id))
        })?;

        let required = self.package(&booking.package_id)?.session_count as usize;
        let live = self
            .store
            .sessions_for_booking(booking_id)?
            .iter()
            .filter(|s| s.status != SessionStatus::Missed)
            .count();
        if live >= required {
            return Err(MentoraError::validation(format!(
                "booking {} already has {} of {} sessions scheduled or completed",
                booking_id, live, required
            )));
        }

        let instructor = self.load_instructor(&instructor_id)?;
        self.check_slot(&instructor, &starts_at, now)?;

        let session = ScheduledSession::new(&booking, instructor_id, starts_at);
        self.store.insert_session(&session)?;

        self.audit(AuditEventType::SessionScheduled {
            session_id: session.id,
            booking_id: *booking_id,
            starts_at,
            actor: actor.clone(),
        });
        info!(session_id = %session.id, booking_id = %booking_id, starts_at = %starts_at, "Make-up session scheduled");
        self.emit(CoreEvent::SessionScheduled {
            session_id: session.id,
            booking_id: *booking_id,
            starts_at,
        });

        Ok(session)
    }

    /// Move an upcoming session to another free approved slot
    pub fn reschedule_session(
        &self,
        actor: &Actor,
        session_id: &SessionId,
        expected: SessionStatus,
        starts_at: DateTime<Local>,
        now: DateTime<Local>,
    ) -> Result<ScheduledSession> {
        let mut session = self.load_session(session_id)?;
        if !(actor.is_staff() || actor.is_instructor(&session.instructor_id)) {
            return Err(MentoraError::permission(
                "only staff or the session's instructor may reschedule it",
            ));
        }
        check_session_status(&session, expected)?;
        if session.status != SessionStatus::Upcoming {
            return Err(MentoraError::conflict(format!(
                "session {} is {}, only upcoming sessions can be rescheduled",
                session_id,
                session.status.as_tag()
            )));
        }

        let instructor = self.load_instructor(&session.instructor_id)?;
        self.check_slot(&instructor, &starts_at, now)?;
        self.store.reschedule_session(session_id, starts_at)?;

        self.audit(AuditEventType::SessionRescheduled {
            session_id: *session_id,
            from: session.starts_at,
            to: starts_at,
            actor: actor.clone(),
        });
        info!(session_id = %session_id, from = %session.starts_at, to = %starts_at, "Session rescheduled");

        session.starts_at = starts_at;
        self.emit(CoreEvent::SessionRescheduled {
            session_id: *session_id,
            booking_id: session.booking_id,
            starts_at,
        });

        Ok(session)
    }

    /// Record that a session took place.
    ///
    /// The mark is authoritative and overrides an automatic Missed flag, but
    /// only when the caller saw the session as `expected`.
    /// Completing the last outstanding session completes the booking.
    pub fn mark_session_completed(
        &self,
        actor: &Actor,
        session_id: &SessionId,
        expected: SessionStatus,
        now: DateTime<Local>,
    ) -> Result<ScheduledSession> {
        let mut session = self.load_session(session_id)?;
        if !(actor.is_staff() || actor.is_instructor(&session.instructor_id)) {
            return Err(MentoraError::permission(
                "only staff or the session's instructor may mark it completed",
            ));
        }
        check_session_status(&session, expected)?;
        if session.status == SessionStatus::Completed {
            return Err(MentoraError::conflict(format!(
                "session {} is already completed",
                session_id
            )));
        }

        let opens_at = session.starts_at - minutes(self.settings().join_window.join_minutes_before);
        if now < opens_at {
            return Err(MentoraError::validation(format!(
                "session {} has not started yet",
                session_id
            )));
        }

        let booking = self.load_booking(&session.booking_id)?;
        if booking.status == BookingStatus::Cancelled {
            return Err(MentoraError::conflict(format!(
                "booking {} is cancelled",
                booking.id
            )));
        }

        let required = self.package(&booking.package_id)?.session_count as usize;
        let completed = self
            .store
            .sessions_for_booking(&booking.id)?
            .iter()
            .filter(|s| s.status == SessionStatus::Completed)
            .count();
        if completed >= required {
            return Err(MentoraError::validation(format!(
                "booking {} already has all {} sessions completed",
                booking.id, required
            )));
        }

        let previous = expected;
        self.store
            .transition_session(session_id, previous, SessionStatus::Completed)?;
        session.status = SessionStatus::Completed;

        self.audit(AuditEventType::SessionCompleted {
            session_id: *session_id,
            booking_id: booking.id,
            actor: actor.clone(),
            overrode_missed: previous == SessionStatus::Missed,
        });
        info!(
            session_id = %session_id,
            booking_id = %booking.id,
            previous = previous.as_tag(),
            "Session completed"
        );
        self.emit(CoreEvent::SessionCompleted {
            session_id: *session_id,
            booking_id: booking.id,
        });

        self.complete_booking_if_done(&booking.id)?;
        Ok(session)
    }

    /// Complete a confirmed booking once every session is terminal and the
    /// completed count equals the package's session count.
    pub(crate) fn complete_booking_if_done(&self, booking_id: &BookingId) -> Result<bool> {
        let booking = self.load_booking(booking_id)?;
        if booking.status != BookingStatus::Confirmed {
            return Ok(false);
        }

        let required = self.package(&booking.package_id)?.session_count as usize;
        let sessions = self.store.sessions_for_booking(booking_id)?;
        let all_terminal = sessions.iter().all(|s| s.status.is_terminal());
        let completed = sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Completed)
            .count();

        if !all_terminal || completed != required {
            return Ok(false);
        }

        match self.store.transition_booking(
            booking_id,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
        ) {
            Ok(()) => {}
            // Another writer completed or cancelled it first
            Err(StoreError::Conflict(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        self.audit(AuditEventType::BookingCompleted {
            booking_id: *booking_id,
        });
        info!(booking_id = %booking_id, sessions = completed, "Booking completed");
        self.emit(CoreEvent::BookingCompleted {
            booking_id: *booking_id,
        });

        Ok(true)
    }

    /// Persist Missed for every upcoming session whose join window has
    /// closed, then re-check completion of the affected bookings.
    pub fn reconcile(&self, now: DateTime<Local>) -> Result<Vec<ScheduledSession>> {
        let cutoff = now - minutes(self.settings().join_window.expire_minutes_after);
        let missed = self.store.mark_overdue_missed(cutoff)?;

        let mut affected = HashSet::new();
        for session in &missed {
            self.audit(AuditEventType::SessionMissed {
                session_id: session.id,
                booking_id: session.booking_id,
                starts_at: session.starts_at,
            });
            self.emit(CoreEvent::SessionMissed {
                session_id: session.id,
                booking_id: session.booking_id,
                starts_at: session.starts_at,
            });
            affected.insert(session.booking_id);
        }

        for booking_id in &affected {
            self.complete_booking_if_done(booking_id)?;
        }

        if !missed.is_empty() {
            info!(count = missed.len(), "Overdue sessions marked missed");
        }
        Ok(missed)
    }

    /// Sessions of a booking, reconciled first
    pub fn sessions_for_booking(
        &self,
        actor: &Actor,
        booking_id: &BookingId,
        now: DateTime<Local>,
    ) -> Result<Vec<ScheduledSession>> {
        self.get_booking(actor, booking_id)?;
        self.reconcile(now)?;
        Ok(self.store.sessions_for_booking(booking_id)?)
    }

    /// An instructor's sessions, reconciled first
    pub fn sessions_for_instructor(
        &self,
        actor: &Actor,
        instructor_id: &InstructorId,
        now: DateTime<Local>,
    ) -> Result<Vec<ScheduledSession>> {
        if !(actor.is_staff() || actor.is_instructor(instructor_id)) {
            return Err(MentoraError::permission(format!(
                "{} may not view instructor {}'s sessions",
                actor, instructor_id
            )));
        }
        self.reconcile(now)?;
        Ok(self.store.sessions_for_instructor(instructor_id)?)
    }

    /// A session visible to the actor
    pub fn get_session(&self, actor: &Actor, id: &SessionId) -> Result<ScheduledSession> {
        let session = self.load_session(id)?;
        self.get_booking(actor, &session.booking_id)?;
        Ok(session)
    }

    /// Whether the actor may join the session right now
    pub fn join_state(
        &self,
        actor: &Actor,
        id: &SessionId,
        now: DateTime<Local>,
    ) -> Result<GateState> {
        let session = self.get_session(actor, id)?;
        Ok(evaluate_gate(
            now,
            session.starts_at,
            session.status,
            Some(&self.settings().join_window),
        ))
    }

    pub(crate) fn load_session(&self, id: &SessionId) -> Result<ScheduledSession> {
        self.store
            .get_session(id)?
            .ok_or_else(|| MentoraError::not_found(format!("session {}", id)))
    }
}

/// The caller's view of a session must still be current
fn check_session_status(session: &ScheduledSession, expected: SessionStatus) -> Result<()> {
    if session.status != expected {
        return Err(MentoraError::conflict(format!(
            "session {} is {}, not {} as expected",
            session.id,
            session.status.as_tag(),
            expected.as_tag()
        )));
    }
    Ok(())
}
