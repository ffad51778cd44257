//! Time utilities for mentora
//!
//! All engine decisions (join windows, overdue reconciliation, slot planning)
//! read the wall clock through [`now`], so a single switch moves the whole
//! service in time.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `MENTORA_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising join windows and the missed-session sweep.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2026-10-20 15:55:00`)
//!
//! Example:
//! ```bash
//! MENTORA_MOCK_TIME="2026-10-20 15:55:00" mentorad serve
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "MENTORA_MOCK_TIME";

/// Format accepted by `MENTORA_MOCK_TIME`
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let mock_time_str = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT)
            else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    expected_format = MOCK_TIME_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };
            let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    "Failed to convert mock time to local timezone"
                );
                return None;
            };
            let offset = mock_dt.signed_duration_since(chrono::Local::now());
            tracing::info!(
                mock_time = %mock_time_str,
                offset_secs = offset.num_seconds(),
                "Mock time enabled"
            );
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Whole minutes as a signed chrono duration
pub fn minutes(m: u32) -> chrono::Duration {
    chrono::Duration::minutes(i64::from(m))
}

/// Convert a stored unix timestamp back into local time
pub fn from_timestamp(secs: i64) -> Option<DateTime<Local>> {
    Local.timestamp_opt(secs, 0).single()
}

/// Combine a calendar date and a wall-clock time into a local instant.
///
/// During a DST fold the earlier instant is used; times skipped by a DST gap
/// yield `None`.
pub fn local_datetime(date: NaiveDate, time: WallClock) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&date.and_time(time.to_naive_time()))
        .earliest()
}

/// Wall-clock time of day at minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse `HH:MM`
    pub fn parse(s: &str) -> Result<Self, String> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| "Expected HH:MM format".to_string())?;

        let hour: u8 = h.parse().map_err(|_| "Invalid hour".to_string())?;
        let minute: u8 = m.parse().map_err(|_| "Invalid minute".to_string())?;

        if hour >= 24 {
            return Err("Hour must be 0-23".into());
        }
        if minute >= 60 {
            return Err("Minute must be 0-59".into());
        }

        Ok(Self { hour, minute })
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// Truncates seconds; callers that need an exact match compare
    /// [`WallClock::matches`] instead.
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    /// True when `time` falls exactly on this wall-clock minute (seconds zero)
    pub fn matches(&self, time: NaiveTime) -> bool {
        time.second() == 0 && time.nanosecond() == 0 && Self::from_naive_time(time) == *self
    }

    pub fn minutes_from_midnight(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight()
            .cmp(&other.minutes_from_midnight())
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallClock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WallClock {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<WallClock> for String {
    fn from(w: WallClock) -> Self {
        w.to_string()
    }
}

/// Parse a weekday name: English short/long forms or the Arabic day names
/// used by the scheduling screens.
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    let day = match s.trim().to_lowercase().as_str() {
        "mon" | "monday" | "الاثنين" | "الإثنين" => Weekday::Mon,
        "tue" | "tuesday" | "الثلاثاء" => Weekday::Tue,
        "wed" | "wednesday" | "الأربعاء" | "الاربعاء" => Weekday::Wed,
        "thu" | "thursday" | "الخميس" => Weekday::Thu,
        "fri" | "friday" | "الجمعة" => Weekday::Fri,
        "sat" | "saturday" | "السبت" => Weekday::Sat,
        "sun" | "sunday" | "الأحد" | "الاحد" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_wall_clock_ordering() {
        let morning = WallClock::new(8, 0).unwrap();
        let noon = WallClock::new(12, 0).unwrap();
        let evening = WallClock::new(18, 30).unwrap();

        assert!(morning < noon);
        assert!(noon < evening);
        assert!(morning < evening);
    }

    #[test]
    fn test_wall_clock_parse() {
        assert_eq!(WallClock::parse("14:30").unwrap(), WallClock::new(14, 30).unwrap());
        assert_eq!(WallClock::parse("00:00").unwrap(), WallClock::new(0, 0).unwrap());
        assert!(WallClock::parse("24:00").is_err());
        assert!(WallClock::parse("12:60").is_err());
        assert!(WallClock::parse("invalid").is_err());
        assert_eq!(WallClock::new(9, 5).unwrap().to_string(), "09:05");
    }

    #[test]
    fn test_wall_clock_matches_exact_minute() {
        let slot = WallClock::new(16, 0).unwrap();
        assert!(slot.matches(NaiveTime::from_hms_opt(16, 0, 0).unwrap()));
        assert!(!slot.matches(NaiveTime::from_hms_opt(16, 0, 30).unwrap()));
        assert!(!slot.matches(NaiveTime::from_hms_opt(16, 1, 0).unwrap()));
    }

    #[test]
    fn test_wall_clock_serde() {
        let w = WallClock::new(18, 0).unwrap();
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, "\"18:00\"");
        let parsed: WallClock = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, w);
        assert!(serde_json::from_str::<WallClock>("\"25:00\"").is_err());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("mon"), Some(Weekday::Mon));
        assert_eq!(parse_weekday("Sunday"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("الأحد"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("الخميس"), Some(Weekday::Thu));
        assert_eq!(parse_weekday("someday"), None);
    }

    #[test]
    fn test_local_datetime_roundtrips_through_timestamp() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let dt = local_datetime(date, WallClock::new(16, 0).unwrap()).unwrap();
        assert_eq!(dt.date_naive(), date);
        assert_eq!(from_timestamp(dt.timestamp()).unwrap(), dt);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_duration(Duration::from_secs(90_000)), "1d 1h 0m");
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_parse_mock_time_format() {
        assert!(NaiveDateTime::parse_from_str("2026-10-20 15:55:00", MOCK_TIME_FORMAT).is_ok());
        assert!(NaiveDateTime::parse_from_str("2026-10-20T15:55:00", MOCK_TIME_FORMAT).is_err());
        assert!(NaiveDateTime::parse_from_str("2026-10-20", MOCK_TIME_FORMAT).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_is_mock_time_active_in_debug() {
        // OnceLock makes the env var unsettable per-test; only check it doesn't panic
        let _ = is_mock_time_active();
    }
}
