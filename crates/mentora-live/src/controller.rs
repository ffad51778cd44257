//! Cooperative join-window driver
//!
//! One controller is scoped to one session view. It re-evaluates the gate on
//! a tokio interval while Waiting, performs exactly one media permission
//! check once timing allows, and hands the room to the live transport. The
//! published state only becomes Active after the hand-off succeeds.

use chrono::{DateTime, Local};
use mentora_api::{GateState, JoinWindow, SessionStatus};
use mentora_config::LiveRoomSettings;
use mentora_core::evaluate_gate;
use mentora_util::{format_duration, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{LiveError, LiveTransport, MediaGrant, MediaPermission, RoomHandoff};

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// The session being joined, as loaded by the caller
#[derive(Debug, Clone)]
pub struct JoinTarget {
    pub session_id: SessionId,
    pub starts_at: DateTime<Local>,
    pub status: SessionStatus,
    /// Name shown to the other participants
    pub display_name: String,
}

/// How a join attempt finished
#[derive(Debug)]
pub enum JoinOutcome {
    /// Handed off to the transport; the caller now owns the grant
    Joined {
        handoff: RoomHandoff,
        grant: MediaGrant,
    },
    /// Stopped in Ended or Error
    Stopped(GateState),
    /// The consumer went away before Active
    Abandoned,
}

pub struct JoinController {
    media: Arc<dyn MediaPermission>,
    transport: Arc<dyn LiveTransport>,
    window: Option<JoinWindow>,
    room: LiveRoomSettings,
    clock: Clock,
    tick: Duration,
    state_tx: watch::Sender<GateState>,
}

impl JoinController {
    pub fn new(
        media: Arc<dyn MediaPermission>,
        transport: Arc<dyn LiveTransport>,
        window: Option<JoinWindow>,
        room: LiveRoomSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(GateState::Loading);
        Self {
            media,
            transport,
            window,
            room,
            clock: Arc::new(mentora_util::now),
            tick: Duration::from_secs(1),
            state_tx,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Re-evaluation period while Waiting
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Follow the published state
    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> GateState {
        self.state_tx.borrow().clone()
    }

    /// Drive the view until it is joined, ends, fails or is abandoned.
    ///
    /// Any message on (or drop of) the `abandon` sender counts as the
    /// consumer leaving. Calling `run` again after an Error is a retry:
    /// timing is re-evaluated before anything else.
    pub async fn run(&self, target: &JoinTarget, mut abandon: oneshot::Receiver<()>) -> JoinOutcome {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        let closes_at = loop {
            let state = evaluate_gate(
                (self.clock)(),
                target.starts_at,
                target.status,
                self.window.as_ref(),
            );

            match state {
                GateState::Active { closes_at } => break closes_at,
                GateState::Waiting { .. } | GateState::Loading => {
                    self.publish(state);
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = &mut abandon => return self.abandoned(target, None).await,
                    }
                }
                GateState::Ended { .. } | GateState::Error { .. } => {
                    self.publish(state.clone());
                    return JoinOutcome::Stopped(state);
                }
            }
        };

        // Checking media access
        self.publish(GateState::Loading);

        let grant = tokio::select! {
            result = timeout(self.room.permission_timeout, self.media.request()) => match result {
                Ok(Ok(grant)) => grant,
                Ok(Err(e)) => return self.fail(target, e, None).await,
                Err(_) => return self.fail(target, LiveError::PermissionTimeout, None).await,
            },
            _ = &mut abandon => return self.abandoned(target, None).await,
        };

        let handoff =
            RoomHandoff::for_session(&self.room, &target.session_id, target.display_name.clone());

        tokio::select! {
            result = self.transport.hand_off(&handoff, &grant) => {
                if let Err(e) = result {
                    return self.fail(target, e, Some(grant)).await;
                }
            }
            _ = &mut abandon => return self.abandoned(target, Some(grant)).await,
        }

        self.publish(GateState::Active { closes_at });
        info!(
            session_id = %target.session_id,
            room = %handoff.room,
            "Joined live session"
        );

        JoinOutcome::Joined { handoff, grant }
    }

    fn publish(&self, state: GateState) {
        let previous = self.state_tx.send_replace(state.clone());
        match &state {
            GateState::Waiting { opens_at, countdown } => {
                if !previous.is_waiting() {
                    debug!(
                        opens_at = %opens_at,
                        countdown = %format_duration(*countdown),
                        "Waiting for join window"
                    );
                }
            }
            _ if previous != state => debug!(state = ?state, "Gate state changed"),
            _ => {}
        }
    }

    async fn fail(
        &self,
        target: &JoinTarget,
        error: LiveError,
        grant: Option<MediaGrant>,
    ) -> JoinOutcome {
        warn!(session_id = %target.session_id, error = %error, "Join failed");
        if let Some(grant) = grant {
            self.release(grant).await;
        }

        let state = GateState::Error {
            error: error.to_gate_error(),
        };
        self.publish(state.clone());
        JoinOutcome::Stopped(state)
    }

    async fn abandoned(&self, target: &JoinTarget, grant: Option<MediaGrant>) -> JoinOutcome {
        debug!(session_id = %target.session_id, "Join abandoned");
        if let Some(grant) = grant {
            self.release(grant).await;
        }
        JoinOutcome::Abandoned
    }

    async fn release(&self, grant: MediaGrant) {
        if let Err(e) = self.media.release(grant).await {
            warn!(grant = grant.id(), error = %e, "Failed to release media grant");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockMedia, MockTransport};
    use chrono::TimeZone;
    use mentora_api::{EndedReason, GateError};
    use std::sync::atomic::{AtomicI64, Ordering};

    fn base() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 20, 15, 0, 0).unwrap()
    }

    fn fixed(at: DateTime<Local>) -> Clock {
        Arc::new(move || at)
    }

    fn target(starts_at: DateTime<Local>, status: SessionStatus) -> JoinTarget {
        JoinTarget {
            session_id: SessionId::new(),
            starts_at,
            status,
            display_name: "Guardian".into(),
        }
    }

    fn controller(media: &Arc<MockMedia>, transport: &Arc<MockTransport>) -> JoinController {
        let room = LiveRoomSettings {
            permission_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        JoinController::new(
            media.clone(),
            transport.clone(),
            Some(JoinWindow::default()),
            room,
        )
        .with_tick(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn joins_when_window_is_open() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        let target = target(base() + chrono::Duration::minutes(5), SessionStatus::Upcoming);
        let ctl = controller(&media, &transport).with_clock(fixed(base()));

        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&target, rx).await;

        let JoinOutcome::Joined { handoff, .. } = outcome else {
            panic!("expected join, got {:?}", outcome);
        };
        assert_eq!(handoff.room, format!("mentora-session-{}", target.session_id));
        assert!(ctl.state().is_active());
        assert_eq!(media.held_grants(), 1);
        assert_eq!(media.request_count(), 1);
        assert_eq!(transport.handoffs().len(), 1);
    }

    #[tokio::test]
    async fn waits_then_joins() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        // Window opens two minutes after base
        let target = target(base() + chrono::Duration::minutes(12), SessionStatus::Upcoming);

        let calls = Arc::new(AtomicI64::new(0));
        let counter = calls.clone();
        let clock: Clock = Arc::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            base() + chrono::Duration::minutes(n)
        });

        let ctl = controller(&media, &transport).with_clock(clock);
        let mut states = ctl.watch();

        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&target, rx).await;

        assert!(matches!(outcome, JoinOutcome::Joined { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(media.request_count(), 1);
        assert!(states.borrow_and_update().is_active());
    }

    #[tokio::test]
    async fn ended_sessions_never_ask_for_media() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        let ctl = controller(&media, &transport).with_clock(fixed(base()));

        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&target(base(), SessionStatus::Completed), rx).await;

        assert!(matches!(
            outcome,
            JoinOutcome::Stopped(GateState::Ended {
                reason: EndedReason::SessionCompleted
            })
        ));
        assert_eq!(media.request_count(), 0);
    }

    #[tokio::test]
    async fn missing_window_settings_is_an_error() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        let ctl = JoinController::new(
            media.clone(),
            transport.clone(),
            None,
            LiveRoomSettings::default(),
        )
        .with_clock(fixed(base()));

        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&target(base(), SessionStatus::Upcoming), rx).await;

        assert!(matches!(
            outcome,
            JoinOutcome::Stopped(GateState::Error {
                error: GateError::MissingSettings
            })
        ));
    }

    #[tokio::test]
    async fn denied_permission_then_retry_rechecks_timing() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        media.deny.store(true, Ordering::SeqCst);
        let session = target(base(), SessionStatus::Upcoming);

        let ctl = controller(&media, &transport).with_clock(fixed(base()));
        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&session, rx).await;

        assert!(matches!(
            outcome,
            JoinOutcome::Stopped(GateState::Error {
                error: GateError::PermissionDenied(_)
            })
        ));
        assert!(ctl.state().can_retry());

        // Fixed the cause, but the window has since closed
        media.deny.store(false, Ordering::SeqCst);
        let ctl = controller(&media, &transport)
            .with_clock(fixed(base() + chrono::Duration::minutes(121)));
        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&session, rx).await;

        assert!(matches!(
            outcome,
            JoinOutcome::Stopped(GateState::Ended {
                reason: EndedReason::WindowClosed
            })
        ));
        assert_eq!(media.request_count(), 1);
    }

    #[tokio::test]
    async fn unanswered_prompt_times_out() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        media.hang.store(true, Ordering::SeqCst);
        let ctl = controller(&media, &transport).with_clock(fixed(base()));

        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&target(base(), SessionStatus::Upcoming), rx).await;

        assert!(matches!(
            outcome,
            JoinOutcome::Stopped(GateState::Error {
                error: GateError::PermissionTimeout
            })
        ));
        assert_eq!(media.held_grants(), 0);
    }

    #[tokio::test]
    async fn transport_failure_releases_grant() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        transport.fail_init.store(true, Ordering::SeqCst);
        let ctl = controller(&media, &transport).with_clock(fixed(base()));

        let (_tx, rx) = oneshot::channel();
        let outcome = ctl.run(&target(base(), SessionStatus::Upcoming), rx).await;

        assert!(matches!(
            outcome,
            JoinOutcome::Stopped(GateState::Error {
                error: GateError::TransportInit(_)
            })
        ));
        assert_eq!(media.held_grants(), 0);
        assert!(!ctl.state().is_active());
    }

    #[tokio::test]
    async fn abandon_while_waiting() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        let ctl = controller(&media, &transport)
            .with_clock(fixed(base()))
            .with_tick(Duration::from_secs(1));

        let (tx, rx) = oneshot::channel();
        drop(tx);
        let outcome = ctl
            .run(&target(base() + chrono::Duration::hours(1), SessionStatus::Upcoming), rx)
            .await;

        assert!(matches!(outcome, JoinOutcome::Abandoned));
        assert!(ctl.state().is_waiting());
        assert_eq!(media.request_count(), 0);
    }

    #[tokio::test]
    async fn abandon_during_permission_prompt() {
        let media = Arc::new(MockMedia::new());
        let transport = Arc::new(MockTransport::new());
        media.hang.store(true, Ordering::SeqCst);

        let room = LiveRoomSettings {
            permission_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let ctl = JoinController::new(
            media.clone(),
            transport.clone(),
            Some(JoinWindow::default()),
            room,
        )
        .with_clock(fixed(base()));

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });
        let outcome = ctl.run(&target(base(), SessionStatus::Upcoming), rx).await;

        assert!(matches!(outcome, JoinOutcome::Abandoned));
        assert!(!ctl.state().is_active());
        assert_eq!(media.held_grants(), 0);
        assert!(transport.handoffs().is_empty());
    }
}
