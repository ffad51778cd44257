//! SQLite-based store implementation

use chrono::{DateTime, Local};
use mentora_api::{
    ApprovalStatus, AvailabilitySet, Booking, BookingStatus, Instructor, OrderStatus, Payout,
    ProfileChange, ProgressNote, ScheduledSession, ServiceOrder, SessionStatus,
};
use mentora_util::{
    from_timestamp, BookingId, ChildId, GuardianId, InstructorId, Money, OrderId, PackageId,
    ServiceId, SessionId, StaffId,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, Store, StoreError, StoreResult};

const BOOKING_COLUMNS: &str = "id, guardian_id, child_id, instructor_id, package_id, status, \
     total_price, receipt_ref, progress_notes_json, created_at";

const SESSION_COLUMNS: &str = "id, booking_id, child_id, instructor_id, starts_at, status";

const INSTRUCTOR_COLUMNS: &str = "id, display_name, bio, availability_json, schedule_status, \
     pending_schedule_json, rates_json, pending_profile_json";

const PAYOUT_COLUMNS: &str = "id, instructor_id, amount, paid_on, memo, recorded_by";

const ORDER_COLUMNS: &str =
    "id, guardian_id, instructor_id, service_id, price, status, created_at";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                guardian_id TEXT NOT NULL,
                child_id TEXT NOT NULL,
                instructor_id TEXT,
                package_id TEXT NOT NULL,
                status TEXT NOT NULL,
                total_price INTEGER NOT NULL,
                receipt_ref TEXT,
                progress_notes_json TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            -- starts_at is a unix timestamp so equal instants compare equal
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                booking_id TEXT NOT NULL REFERENCES bookings(id),
                child_id TEXT NOT NULL,
                instructor_id TEXT NOT NULL,
                starts_at INTEGER NOT NULL,
                status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS instructors (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                bio TEXT,
                availability_json TEXT NOT NULL,
                schedule_status TEXT NOT NULL,
                pending_schedule_json TEXT,
                rates_json TEXT NOT NULL,
                pending_profile_json TEXT
            );

            CREATE TABLE IF NOT EXISTS payouts (
                id TEXT PRIMARY KEY,
                instructor_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                paid_on TEXT NOT NULL,
                memo TEXT NOT NULL,
                recorded_by TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS service_orders (
                id TEXT PRIMARY KEY,
                guardian_id TEXT NOT NULL,
                instructor_id TEXT NOT NULL,
                service_id TEXT NOT NULL,
                price INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- One upcoming session per instructor per instant
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_upcoming_slot
                ON sessions(instructor_id, starts_at) WHERE status = 'upcoming';

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_sessions_booking ON sessions(booking_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_status_start ON sessions(status, starts_at);
            CREATE INDEX IF NOT EXISTS idx_payouts_instructor ON payouts(instructor_id);
            CREATE INDEX IF NOT EXISTS idx_orders_instructor ON service_orders(instructor_id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    /// Read-modify-write an instructor inside one transaction
    fn modify_instructor(
        &self,
        id: &InstructorId,
        apply: impl FnOnce(&mut Instructor) -> StoreResult<()>,
    ) -> StoreResult<Instructor> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut instructor = tx
            .query_row(
                &format!("SELECT {} FROM instructors WHERE id = ?", INSTRUCTOR_COLUMNS),
                [id.as_str()],
                instructor_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("instructor {}", id)))?;

        apply(&mut instructor)?;
        write_instructor(&tx, &instructor)?;
        tx.commit()?;

        Ok(instructor)
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(AuditEvent {
                id: row.get(0)?,
                timestamp: datetime_column(row, 1)?,
                event: json_column(row, 2)?,
            })
        })?;

        let events = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn insert_booking(&self, booking: &Booking) -> StoreResult<()> {
        let conn = self.conn()?;
        let notes_json = serde_json::to_string(&booking.progress_notes)?;

        conn.execute(
            &format!(
                "INSERT INTO bookings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                BOOKING_COLUMNS
            ),
            params![
                booking.id.to_string(),
                booking.guardian_id.as_str(),
                booking.child_id.as_str(),
                booking.instructor_id.as_ref().map(|i| i.as_str()),
                booking.package_id.as_str(),
                booking.status.as_tag(),
                booking.total_price.minor(),
                booking.receipt_ref,
                notes_json,
                booking.created_at.to_rfc3339(),
            ],
        )
        .map_err(constraint_as_conflict)?;

        debug!(booking_id = %booking.id, "Booking inserted");
        Ok(())
    }

    fn get_booking(&self, id: &BookingId) -> StoreResult<Option<Booking>> {
        let conn = self.conn()?;
        let booking = conn
            .query_row(
                &format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS),
                [id.to_string()],
                booking_from_row,
            )
            .optional()?;
        Ok(booking)
    }

    fn list_bookings(&self) -> StoreResult<Vec<Booking>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bookings ORDER BY created_at, id",
            BOOKING_COLUMNS
        ))?;
        let bookings = stmt
            .query_map([], booking_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bookings)
    }

    fn transition_booking(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let id = id.to_string();
        let changed = conn.execute(
            "UPDATE bookings SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![next.as_tag(), id, expected.as_tag()],
        )?;
        guard_outcome(&conn, "bookings", &id, expected.as_tag(), changed)?;

        debug!(booking_id = %id, from = expected.as_tag(), to = next.as_tag(), "Booking transitioned");
        Ok(())
    }

    fn set_receipt(&self, id: &BookingId, expected: BookingStatus, receipt: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let id = id.to_string();
        let changed = conn.execute(
            "UPDATE bookings SET receipt_ref = ?1 WHERE id = ?2 AND status = ?3",
            params![receipt, id, expected.as_tag()],
        )?;
        guard_outcome(&conn, "bookings", &id, expected.as_tag(), changed)
    }

    fn assign_instructor(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        instructor_id: &InstructorId,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let id = id.to_string();
        let changed = conn.execute(
            "UPDATE bookings SET instructor_id = ?1 WHERE id = ?2 AND status = ?3",
            params![instructor_id.as_str(), id, expected.as_tag()],
        )?;
        guard_outcome(&conn, "bookings", &id, expected.as_tag(), changed)
    }

    fn add_progress_note(&self, id: &BookingId, note: &ProgressNote) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = id.to_string();

        let notes_json: String = tx
            .query_row(
                "SELECT progress_notes_json FROM bookings WHERE id = ?",
                [&id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?;

        let mut notes: Vec<ProgressNote> = serde_json::from_str(&notes_json)?;
        notes.push(note.clone());

        tx.execute(
            "UPDATE bookings SET progress_notes_json = ?1 WHERE id = ?2",
            params![serde_json::to_string(&notes)?, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn confirm_booking(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        sessions: &[ScheduledSession],
    ) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let booking_id = id.to_string();

        let changed = tx.execute(
            "UPDATE bookings SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![BookingStatus::Confirmed.as_tag(), booking_id, expected.as_tag()],
        )?;
        guard_outcome(&tx, "bookings", &booking_id, expected.as_tag(), changed)?;

        for session in sessions {
            reserve_slot(&tx, session)?;
        }

        tx.commit()?;
        debug!(booking_id = %booking_id, sessions = sessions.len(), "Booking confirmed");
        Ok(())
    }

    fn cancel_booking(&self, id: &BookingId, expected: BookingStatus) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let booking_id = id.to_string();

        let changed = tx.execute(
            "UPDATE bookings SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![BookingStatus::Cancelled.as_tag(), booking_id, expected.as_tag()],
        )?;
        guard_outcome(&tx, "bookings", &booking_id, expected.as_tag(), changed)?;

        let removed = tx.execute(
            "DELETE FROM sessions WHERE booking_id = ?1 AND status = ?2",
            params![booking_id, SessionStatus::Upcoming.as_tag()],
        )?;

        tx.commit()?;
        debug!(booking_id = %booking_id, removed, "Booking cancelled");
        Ok(removed)
    }

    fn insert_session(&self, session: &ScheduledSession) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        reserve_slot(&tx, session)?;
        tx.commit()?;
        Ok(())
    }

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<ScheduledSession>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS),
                [id.to_string()],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    fn sessions_for_booking(&self, booking_id: &BookingId) -> StoreResult<Vec<ScheduledSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE booking_id = ? ORDER BY starts_at, id",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map([booking_id.to_string()], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn sessions_for_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> StoreResult<Vec<ScheduledSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE instructor_id = ? ORDER BY starts_at, id",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map([instructor_id.as_str()], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn transition_session(
        &self,
        id: &SessionId,
        expected: SessionStatus,
        next: SessionStatus,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let id = id.to_string();
        let changed = conn.execute(
            "UPDATE sessions SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![next.as_tag(), id, expected.as_tag()],
        )?;
        guard_outcome(&conn, "sessions", &id, expected.as_tag(), changed)?;

        debug!(session_id = %id, from = expected.as_tag(), to = next.as_tag(), "Session transitioned");
        Ok(())
    }

    fn reschedule_session(&self, id: &SessionId, starts_at: DateTime<Local>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let session_id = id.to_string();

        let session = tx
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS),
                [&session_id],
                session_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id)))?;

        if session.status != SessionStatus::Upcoming {
            return Err(StoreError::Conflict(format!(
                "session {} is '{}', only upcoming sessions can move",
                session_id,
                session.status.as_tag()
            )));
        }

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions \
             WHERE instructor_id = ?1 AND starts_at = ?2 AND status = ?3 AND id != ?4)",
            params![
                session.instructor_id.as_str(),
                starts_at.timestamp(),
                SessionStatus::Upcoming.as_tag(),
                session_id
            ],
            |row| row.get(0),
        )?;
        if taken {
            return Err(slot_taken(&session.instructor_id, &starts_at));
        }

        tx.execute(
            "UPDATE sessions SET starts_at = ?1 WHERE id = ?2",
            params![starts_at.timestamp(), session_id],
        )
        .map_err(constraint_as_conflict)?;

        tx.commit()?;
        debug!(session_id = %session_id, starts_at = %starts_at, "Session rescheduled");
        Ok(())
    }

    fn mark_overdue_missed(&self, cutoff: DateTime<Local>) -> StoreResult<Vec<ScheduledSession>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let upcoming = SessionStatus::Upcoming.as_tag();
        // Start times are whole seconds; round a fractional cutoff up so that
        // `starts_at < cutoff` holds exactly as it does in memory
        let cutoff_secs = cutoff.timestamp() + i64::from(cutoff.timestamp_subsec_nanos() > 0);

        let mut overdue = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM sessions WHERE status = ?1 AND starts_at < ?2 ORDER BY starts_at",
                SESSION_COLUMNS
            ))?;
            stmt.query_map(params![upcoming, cutoff_secs], session_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        for session in &mut overdue {
            tx.execute(
                "UPDATE sessions SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![SessionStatus::Missed.as_tag(), session.id.to_string(), upcoming],
            )?;
            session.status = SessionStatus::Missed;
        }

        tx.commit()?;
        if !overdue.is_empty() {
            debug!(count = overdue.len(), cutoff = %cutoff, "Overdue sessions marked missed");
        }
        Ok(overdue)
    }

    fn insert_instructor_if_absent(&self, instructor: &Instructor) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO instructors ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                INSTRUCTOR_COLUMNS
            ),
            params![
                instructor.id.as_str(),
                instructor.display_name,
                instructor.bio,
                serde_json::to_string(&instructor.availability)?,
                instructor.schedule_status.as_tag(),
                optional_json(&instructor.pending_schedule)?,
                serde_json::to_string(&instructor.rates)?,
                optional_json(&instructor.pending_profile)?,
            ],
        )?;
        Ok(changed > 0)
    }

    fn get_instructor(&self, id: &InstructorId) -> StoreResult<Option<Instructor>> {
        let conn = self.conn()?;
        let instructor = conn
            .query_row(
                &format!("SELECT {} FROM instructors WHERE id = ?", INSTRUCTOR_COLUMNS),
                [id.as_str()],
                instructor_from_row,
            )
            .optional()?;
        Ok(instructor)
    }

    fn list_instructors(&self) -> StoreResult<Vec<Instructor>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM instructors ORDER BY id",
            INSTRUCTOR_COLUMNS
        ))?;
        let instructors = stmt
            .query_map([], instructor_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(instructors)
    }

    fn propose_schedule(&self, id: &InstructorId, proposal: &AvailabilitySet) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE instructors SET pending_schedule_json = ?1, schedule_status = ?2 \
             WHERE id = ?3 AND pending_schedule_json IS NULL",
            params![
                serde_json::to_string(proposal)?,
                ApprovalStatus::Pending.as_tag(),
                id.as_str()
            ],
        )?;
        pending_slot_outcome(&conn, id, "schedule", changed)
    }

    fn approve_schedule(&self, id: &InstructorId) -> StoreResult<Instructor> {
        self.modify_instructor(id, |instructor| {
            let proposal = instructor
                .pending_schedule
                .take()
                .ok_or_else(|| no_pending(&instructor.id, "schedule"))?;
            instructor.availability = proposal;
            instructor.schedule_status = ApprovalStatus::Approved;
            Ok(())
        })
    }

    fn reject_schedule(&self, id: &InstructorId) -> StoreResult<Instructor> {
        self.modify_instructor(id, |instructor| {
            instructor
                .pending_schedule
                .take()
                .ok_or_else(|| no_pending(&instructor.id, "schedule"))?;
            instructor.schedule_status = if instructor.availability.is_empty() {
                ApprovalStatus::None
            } else {
                ApprovalStatus::Approved
            };
            Ok(())
        })
    }

    fn propose_profile(&self, id: &InstructorId, change: &ProfileChange) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE instructors SET pending_profile_json = ?1 \
             WHERE id = ?2 AND pending_profile_json IS NULL",
            params![serde_json::to_string(change)?, id.as_str()],
        )?;
        pending_slot_outcome(&conn, id, "profile", changed)
    }

    fn approve_profile(&self, id: &InstructorId) -> StoreResult<Instructor> {
        self.modify_instructor(id, |instructor| {
            let change = instructor
                .pending_profile
                .take()
                .ok_or_else(|| no_pending(&instructor.id, "profile"))?;
            instructor.apply_profile_change(change);
            Ok(())
        })
    }

    fn reject_profile(&self, id: &InstructorId) -> StoreResult<Instructor> {
        self.modify_instructor(id, |instructor| {
            instructor
                .pending_profile
                .take()
                .ok_or_else(|| no_pending(&instructor.id, "profile"))?;
            Ok(())
        })
    }

    fn insert_payout(&self, payout: &Payout) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO payouts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                PAYOUT_COLUMNS
            ),
            params![
                payout.id.to_string(),
                payout.instructor_id.as_str(),
                payout.amount.minor(),
                payout.paid_on.format("%Y-%m-%d").to_string(),
                payout.memo,
                payout.recorded_by.as_str(),
            ],
        )
        .map_err(constraint_as_conflict)?;

        debug!(payout_id = %payout.id, amount = %payout.amount, "Payout inserted");
        Ok(())
    }

    fn payouts_for_instructor(&self, instructor_id: &InstructorId) -> StoreResult<Vec<Payout>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payouts WHERE instructor_id = ? ORDER BY paid_on, rowid",
            PAYOUT_COLUMNS
        ))?;
        let payouts = stmt
            .query_map([instructor_id.as_str()], |row| {
                Ok(Payout {
                    id: parse_column(row, 0)?,
                    instructor_id: InstructorId::new(row.get::<_, String>(1)?),
                    amount: Money::from_minor(row.get(2)?),
                    paid_on: parse_column(row, 3)?,
                    memo: row.get(4)?,
                    recorded_by: StaffId::new(row.get::<_, String>(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(payouts)
    }

    fn insert_order(&self, order: &ServiceOrder) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO service_orders ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                ORDER_COLUMNS
            ),
            params![
                order.id.to_string(),
                order.guardian_id.as_str(),
                order.instructor_id.as_str(),
                order.service_id.as_str(),
                order.price.minor(),
                order.status.as_tag(),
                order.created_at.to_rfc3339(),
            ],
        )
        .map_err(constraint_as_conflict)?;
        Ok(())
    }

    fn get_order(&self, id: &OrderId) -> StoreResult<Option<ServiceOrder>> {
        let conn = self.conn()?;
        let order = conn
            .query_row(
                &format!("SELECT {} FROM service_orders WHERE id = ?", ORDER_COLUMNS),
                [id.to_string()],
                order_from_row,
            )
            .optional()?;
        Ok(order)
    }

    fn orders_for_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> StoreResult<Vec<ServiceOrder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM service_orders WHERE instructor_id = ? ORDER BY created_at, id",
            ORDER_COLUMNS
        ))?;
        let orders = stmt
            .query_map([instructor_id.as_str()], order_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    fn transition_order(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let id = id.to_string();
        let changed = conn.execute(
            "UPDATE service_orders SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![next.as_tag(), id, expected.as_tag()],
        )?;
        guard_outcome(&conn, "service_orders", &id, expected.as_tag(), changed)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

// Write helpers

/// Insert a session unless its instructor already has an upcoming one at that instant
fn reserve_slot(conn: &Connection, session: &ScheduledSession) -> StoreResult<()> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sessions \
         WHERE instructor_id = ?1 AND starts_at = ?2 AND status = ?3)",
        params![
            session.instructor_id.as_str(),
            session.starts_at.timestamp(),
            SessionStatus::Upcoming.as_tag()
        ],
        |row| row.get(0),
    )?;
    if taken {
        return Err(slot_taken(&session.instructor_id, &session.starts_at));
    }

    conn.execute(
        &format!(
            "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            SESSION_COLUMNS
        ),
        params![
            session.id.to_string(),
            session.booking_id.to_string(),
            session.child_id.as_str(),
            session.instructor_id.as_str(),
            session.starts_at.timestamp(),
            session.status.as_tag(),
        ],
    )
    .map_err(constraint_as_conflict)?;

    Ok(())
}

fn write_instructor(conn: &Connection, instructor: &Instructor) -> StoreResult<()> {
    conn.execute(
        "UPDATE instructors SET display_name = ?1, bio = ?2, availability_json = ?3, \
         schedule_status = ?4, pending_schedule_json = ?5, rates_json = ?6, \
         pending_profile_json = ?7 WHERE id = ?8",
        params![
            instructor.display_name,
            instructor.bio,
            serde_json::to_string(&instructor.availability)?,
            instructor.schedule_status.as_tag(),
            optional_json(&instructor.pending_schedule)?,
            serde_json::to_string(&instructor.rates)?,
            optional_json(&instructor.pending_profile)?,
            instructor.id.as_str(),
        ],
    )?;
    Ok(())
}

fn optional_json<T: serde::Serialize>(value: &Option<T>) -> StoreResult<Option<String>> {
    Ok(value.as_ref().map(serde_json::to_string).transpose()?)
}

/// Turn a zero-row guarded update into NotFound or Conflict
fn guard_outcome(
    conn: &Connection,
    table: &'static str,
    id: &str,
    expected: &str,
    changed: usize,
) -> StoreResult<()> {
    if changed > 0 {
        return Ok(());
    }

    let current: Option<String> = conn
        .query_row(
            &format!("SELECT status FROM {} WHERE id = ?", table),
            [id],
            |row| row.get(0),
        )
        .optional()?;

    match current {
        None => Err(StoreError::NotFound(format!("{} {}", table, id))),
        Some(status) => Err(StoreError::Conflict(format!(
            "{} {} is '{}', expected '{}'",
            table, id, status, expected
        ))),
    }
}

fn pending_slot_outcome(
    conn: &Connection,
    id: &InstructorId,
    kind: &str,
    changed: usize,
) -> StoreResult<()> {
    if changed > 0 {
        return Ok(());
    }

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM instructors WHERE id = ?)",
        [id.as_str()],
        |row| row.get(0),
    )?;

    if exists {
        Err(StoreError::Conflict(format!(
            "instructor {} already has a pending {} proposal",
            id, kind
        )))
    } else {
        Err(StoreError::NotFound(format!("instructor {}", id)))
    }
}

fn no_pending(id: &InstructorId, kind: &str) -> StoreError {
    StoreError::Conflict(format!("instructor {} has no pending {} proposal", id, kind))
}

fn slot_taken(instructor_id: &InstructorId, starts_at: &DateTime<Local>) -> StoreError {
    StoreError::Conflict(format!(
        "instructor {} already has a session at {}",
        instructor_id,
        starts_at.format("%Y-%m-%d %H:%M")
    ))
}

fn constraint_as_conflict(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(msg.unwrap_or_else(|| err.to_string()))
        }
        other => other.into(),
    }
}

// Row decoding

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: parse_column(row, 0)?,
        guardian_id: GuardianId::new(row.get::<_, String>(1)?),
        child_id: ChildId::new(row.get::<_, String>(2)?),
        instructor_id: row.get::<_, Option<String>>(3)?.map(InstructorId::new),
        package_id: PackageId::new(row.get::<_, String>(4)?),
        status: tag_column(row, 5, BookingStatus::from_tag)?,
        total_price: Money::from_minor(row.get(6)?),
        receipt_ref: row.get(7)?,
        progress_notes: json_column(row, 8)?,
        created_at: datetime_column(row, 9)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduledSession> {
    Ok(ScheduledSession {
        id: parse_column(row, 0)?,
        booking_id: parse_column(row, 1)?,
        child_id: ChildId::new(row.get::<_, String>(2)?),
        instructor_id: InstructorId::new(row.get::<_, String>(3)?),
        starts_at: timestamp_column(row, 4)?,
        status: tag_column(row, 5, SessionStatus::from_tag)?,
    })
}

fn instructor_from_row(row: &Row<'_>) -> rusqlite::Result<Instructor> {
    Ok(Instructor {
        id: InstructorId::new(row.get::<_, String>(0)?),
        display_name: row.get(1)?,
        bio: row.get(2)?,
        availability: json_column(row, 3)?,
        schedule_status: tag_column(row, 4, ApprovalStatus::from_tag)?,
        pending_schedule: optional_json_column(row, 5)?,
        rates: json_column(row, 6)?,
        pending_profile: optional_json_column(row, 7)?,
    })
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceOrder> {
    Ok(ServiceOrder {
        id: parse_column(row, 0)?,
        guardian_id: GuardianId::new(row.get::<_, String>(1)?),
        instructor_id: InstructorId::new(row.get::<_, String>(2)?),
        service_id: ServiceId::new(row.get::<_, String>(3)?),
        price: Money::from_minor(row.get(4)?),
        status: tag_column(row, 5, OrderStatus::from_tag)?,
        created_at: datetime_column(row, 6)?,
    })
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn tag_column<T>(row: &Row<'_>, idx: usize, from_tag: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let tag: String = row.get(idx)?;
    from_tag(&tag).ok_or_else(|| conversion_error(idx, format!("unknown status tag '{}'", tag)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let secs: i64 = row.get(idx)?;
    from_timestamp(secs).ok_or_else(|| conversion_error(idx, format!("timestamp {} out of range", secs)))
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        serde_json::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
