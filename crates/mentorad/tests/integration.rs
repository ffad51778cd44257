//! Integration tests for mentorad
//!
//! These tests drive the engine end to end the way the service wires it:
//! TOML settings, an on-disk store, the event stream and the join driver.

use chrono::{DateTime, Duration, Local, TimeZone};
use mentora_api::{Actor, BookingStatus, GateState, NewBooking, SessionStatus};
use mentora_config::parse_config;
use mentora_core::{CoreEvent, LifecycleEngine};
use mentora_live::{JoinController, JoinOutcome, JoinTarget, MockMedia, MockTransport};
use mentora_store::{AuditEventType, SqliteStore, Store};
use mentora_util::{ChildId, GuardianId, InstructorId, Money, PackageId, StaffId};
use std::sync::Arc;
use tokio::sync::oneshot;

const CONFIG: &str = r#"
config_version = 1

[join_window]
join_minutes_before = 10
expire_minutes_after = 120

[live]
room_prefix = "mentora-session-"
domain = "meet.example.org"

[[packages]]
id = "individual-4"
name = "باقة فردية"
price = 800
sessions = "4 جلسات فردية"

[[packages]]
id = "trial"
name = "جلسة تجريبية"
price = "100.00"
sessions = "جلسة واحدة"

[[services]]
id = "assessment"
name = "تقييم مستوى"
price = 150

[[instructors]]
id = "inst-1"
name = "Sara"
package_rates = { individual-4 = 200 }
service_rates = { assessment = 100 }

[[instructors.availability]]
days = ["sun", "tue"]
times = ["16:00"]
"#;

/// Monday 2026-10-19 09:00
fn monday_morning() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
}

fn staff() -> Actor {
    Actor::Staff(StaffId::new("staff-1"))
}

fn guardian() -> Actor {
    Actor::Guardian(GuardianId::new("guardian-1"))
}

fn instructor() -> Actor {
    Actor::Instructor(InstructorId::new("inst-1"))
}

fn booking_request(package: &str) -> NewBooking {
    NewBooking {
        guardian_id: GuardianId::new("guardian-1"),
        child_id: ChildId::new("child-1"),
        instructor_id: Some(InstructorId::new("inst-1")),
        package_id: PackageId::new(package),
    }
}

fn open_engine(path: &std::path::Path) -> LifecycleEngine {
    let settings = parse_config(CONFIG).unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(path).unwrap());
    let engine = LifecycleEngine::new(settings, store);
    engine.seed_instructors().unwrap();
    engine
}

#[test]
fn test_package_lifecycle_through_settlement() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&dir.path().join("mentora.db"));
    let mut events = engine.subscribe().unwrap();

    let booking = engine
        .create_booking(&guardian(), booking_request("individual-4"), monday_morning())
        .unwrap();
    assert_eq!(booking.total_price, Money::from_major(800));

    engine
        .attach_receipt(&guardian(), &booking.id, "transfer-20261019.jpg")
        .unwrap();
    let sessions = engine
        .verify_payment(&staff(), &booking.id, BookingStatus::AwaitingPayment, monday_morning())
        .unwrap();
    assert_eq!(sessions.len(), 4);

    for session in &sessions {
        engine
            .mark_session_completed(
                &instructor(),
                &session.id,
                SessionStatus::Upcoming,
                session.starts_at,
            )
            .unwrap();
    }
    assert_eq!(
        engine.get_booking(&guardian(), &booking.id).unwrap().status,
        BookingStatus::Completed
    );

    engine
        .record_payout(
            &staff(),
            &InstructorId::new("inst-1"),
            Money::from_major(300),
            chrono::NaiveDate::from_ymd_opt(2026, 11, 5).unwrap(),
            "November transfer",
        )
        .unwrap();

    let statement = engine
        .settlement_for(&instructor(), &InstructorId::new("inst-1"))
        .unwrap();
    assert_eq!(statement.total_earnings, Money::from_major(800));
    assert_eq!(statement.outstanding, Money::from_major(500));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen
        .iter()
        .any(|e| matches!(e, CoreEvent::BookingConfirmed { session_count: 4, .. })));
    assert!(seen
        .iter()
        .any(|e| matches!(e, CoreEvent::BookingCompleted { booking_id } if *booking_id == booking.id)));
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mentora.db");

    let booking_id = {
        let engine = open_engine(&path);
        let booking = engine
            .create_booking(&guardian(), booking_request("trial"), monday_morning())
            .unwrap();
        engine
            .verify_payment(&staff(), &booking.id, BookingStatus::AwaitingPayment, monday_morning())
            .unwrap();
        booking.id
    };

    // Seeding again must not reset the stored instructor
    let engine = open_engine(&path);
    assert_eq!(engine.list_instructors().unwrap().len(), 1);

    let booking = engine.get_booking(&staff(), &booking_id).unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let sessions = engine
        .sessions_for_booking(&staff(), &booking_id, monday_morning())
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Upcoming);
}

#[test]
fn test_sweep_persists_missed_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&dir.path().join("mentora.db"));

    let booking = engine
        .create_booking(&guardian(), booking_request("individual-4"), monday_morning())
        .unwrap();
    let sessions = engine
        .verify_payment(&staff(), &booking.id, BookingStatus::AwaitingPayment, monday_morning())
        .unwrap();

    let later = sessions[1].starts_at + Duration::minutes(200);
    let missed = engine.reconcile(later).unwrap();
    assert_eq!(missed.len(), 2);

    // A second sweep finds nothing new
    assert!(engine.reconcile(later).unwrap().is_empty());

    let audits = engine.recent_audits(&staff(), 50).unwrap();
    let missed_audits = audits
        .iter()
        .filter(|a| matches!(a.event, AuditEventType::SessionMissed { .. }))
        .count();
    assert_eq!(missed_audits, 2);

    assert!(matches!(
        engine.join_state(&guardian(), &sessions[0].id, later).unwrap(),
        GateState::Ended { .. }
    ));
}

#[tokio::test]
async fn test_join_driver_against_stored_session() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&dir.path().join("mentora.db"));

    let booking = engine
        .create_booking(&guardian(), booking_request("trial"), monday_morning())
        .unwrap();
    let sessions = engine
        .verify_payment(&staff(), &booking.id, BookingStatus::AwaitingPayment, monday_morning())
        .unwrap();
    let session = &sessions[0];

    let now = session.starts_at - Duration::minutes(5);
    assert!(engine.join_state(&guardian(), &session.id, now).unwrap().is_active());

    let media = Arc::new(MockMedia::new());
    let transport = Arc::new(MockTransport::new());
    let controller = JoinController::new(
        media.clone(),
        transport.clone(),
        Some(engine.settings().join_window),
        engine.settings().live.clone(),
    )
    .with_clock(Arc::new(move || now));

    let target = JoinTarget {
        session_id: session.id,
        starts_at: session.starts_at,
        status: session.status,
        display_name: "Guardian".into(),
    };
    let (_abandon, rx) = oneshot::channel();

    match controller.run(&target, rx).await {
        JoinOutcome::Joined { handoff, .. } => {
            assert_eq!(handoff.domain, "meet.example.org");
            assert_eq!(handoff.room, format!("mentora-session-{}", session.id));
        }
        other => panic!("expected join, got {:?}", other),
    }
    assert_eq!(media.held_grants(), 1);
    assert_eq!(transport.handoffs().len(), 1);
}
