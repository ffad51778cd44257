//! Join-window gate
//!
//! A pure function of the clock, the session's start and status, and the
//! configured window. The cooperative driver that re-evaluates it lives in
//! `mentora-live`.

use chrono::{DateTime, Local};
use mentora_api::{EndedReason, GateError, GateState, JoinWindow, SessionStatus};
use mentora_util::minutes;

/// Decide whether a session may be joined at `now`.
///
/// Terminal sessions are always ended. Otherwise the session is joinable from
/// `starts_at - join_minutes_before` through `starts_at + expire_minutes_after`
/// inclusive.
pub fn evaluate_gate(
    now: DateTime<Local>,
    starts_at: DateTime<Local>,
    status: SessionStatus,
    window: Option<&JoinWindow>,
) -> GateState {
    let Some(window) = window else {
        return GateState::Error {
            error: GateError::MissingSettings,
        };
    };

    match status {
        SessionStatus::Completed => {
            return GateState::Ended {
                reason: EndedReason::SessionCompleted,
            }
        }
        SessionStatus::Missed => {
            return GateState::Ended {
                reason: EndedReason::SessionMissed,
            }
        }
        SessionStatus::Upcoming => {}
    }

    let opens_at = starts_at - minutes(window.join_minutes_before);
    let closes_at = starts_at + minutes(window.expire_minutes_after);

    if now > closes_at {
        GateState::Ended {
            reason: EndedReason::WindowClosed,
        }
    } else if now < opens_at {
        GateState::Waiting {
            opens_at,
            countdown: (opens_at - now).to_std().unwrap_or_default(),
        }
    } else {
        GateState::Active { closes_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 20, 16, 0, 0).unwrap()
    }

    fn window() -> JoinWindow {
        JoinWindow {
            join_minutes_before: 10,
            expire_minutes_after: 120,
        }
    }

    fn gate_at(offset_minutes: i64, status: SessionStatus) -> GateState {
        evaluate_gate(
            start() + Duration::minutes(offset_minutes),
            start(),
            status,
            Some(&window()),
        )
    }

    #[test]
    fn waiting_until_the_window_opens() {
        let state = gate_at(-11, SessionStatus::Upcoming);
        assert_eq!(
            state,
            GateState::Waiting {
                opens_at: start() - Duration::minutes(10),
                countdown: std::time::Duration::from_secs(60),
            }
        );
    }

    #[test]
    fn active_from_open_through_close() {
        assert!(gate_at(-10, SessionStatus::Upcoming).is_active());
        assert!(gate_at(0, SessionStatus::Upcoming).is_active());
        assert_eq!(
            gate_at(120, SessionStatus::Upcoming),
            GateState::Active {
                closes_at: start() + Duration::minutes(120)
            }
        );
    }

    #[test]
    fn ended_after_close() {
        assert_eq!(
            gate_at(121, SessionStatus::Upcoming),
            GateState::Ended {
                reason: EndedReason::WindowClosed
            }
        );
    }

    #[test]
    fn terminal_sessions_are_ended_at_any_time() {
        for offset in [-600, -10, 0, 60, 500] {
            assert_eq!(
                gate_at(offset, SessionStatus::Completed),
                GateState::Ended {
                    reason: EndedReason::SessionCompleted
                }
            );
            assert_eq!(
                gate_at(offset, SessionStatus::Missed),
                GateState::Ended {
                    reason: EndedReason::SessionMissed
                }
            );
        }
    }

    #[test]
    fn missing_settings_is_an_error() {
        let state = evaluate_gate(start(), start(), SessionStatus::Upcoming, None);
        assert!(state.can_retry());
        assert_eq!(
            state,
            GateState::Error {
                error: GateError::MissingSettings
            }
        );
    }

    #[test]
    fn same_inputs_same_state() {
        let now = start() - Duration::minutes(30);
        let a = evaluate_gate(now, start(), SessionStatus::Upcoming, Some(&window()));
        let b = evaluate_gate(now, start(), SessionStatus::Upcoming, Some(&window()));
        assert_eq!(a, b);
    }

    #[test]
    fn five_minutes_ahead_is_joinable() {
        let now = start() - Duration::minutes(5);
        assert!(evaluate_gate(now, start(), SessionStatus::Upcoming, Some(&window())).is_active());
    }

    #[test]
    fn long_past_upcoming_session_is_ended() {
        let now = start() + Duration::minutes(200);
        assert!(evaluate_gate(now, start(), SessionStatus::Upcoming, Some(&window())).is_ended());
    }
}
