//! Instructor availability as an ordered set of slots

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, Weekday};
use mentora_util::{local_datetime, WallClock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which day a slot applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotDay {
    /// Repeats every week on this weekday
    Weekly(Weekday),
    /// A single calendar date
    Date(NaiveDate),
}

impl PartialOrd for SlotDay {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlotDay {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SlotDay::Weekly(a), SlotDay::Weekly(b)) => {
                a.num_days_from_monday().cmp(&b.num_days_from_monday())
            }
            (SlotDay::Weekly(_), SlotDay::Date(_)) => Ordering::Less,
            (SlotDay::Date(_), SlotDay::Weekly(_)) => Ordering::Greater,
            (SlotDay::Date(a), SlotDay::Date(b)) => a.cmp(b),
        }
    }
}

/// One bookable start time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub day: SlotDay,
    pub time: WallClock,
}

impl AvailabilitySlot {
    pub fn weekly(day: Weekday, time: WallClock) -> Self {
        Self {
            day: SlotDay::Weekly(day),
            time,
        }
    }

    pub fn on_date(date: NaiveDate, time: WallClock) -> Self {
        Self {
            day: SlotDay::Date(date),
            time,
        }
    }
}

/// Sorted, de-duplicated collection of availability slots.
///
/// For a calendar date that has at least one date-specific slot, those slots
/// replace the weekly slots for that date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AvailabilitySlot>", into = "Vec<AvailabilitySlot>")]
pub struct AvailabilitySet(Vec<AvailabilitySlot>);

impl AvailabilitySet {
    pub fn new(slots: impl IntoIterator<Item = AvailabilitySlot>) -> Self {
        let mut slots: Vec<_> = slots.into_iter().collect();
        slots.sort();
        slots.dedup();
        Self(slots)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AvailabilitySlot> {
        self.0.iter()
    }

    /// Start times offered on a given date, ascending
    pub fn times_on(&self, date: NaiveDate) -> Vec<WallClock> {
        let dated: Vec<WallClock> = self
            .0
            .iter()
            .filter(|s| s.day == SlotDay::Date(date))
            .map(|s| s.time)
            .collect();

        if !dated.is_empty() {
            return dated;
        }

        self.0
            .iter()
            .filter(|s| s.day == SlotDay::Weekly(date.weekday()))
            .map(|s| s.time)
            .collect()
    }

    /// Whether a session may start exactly at `at`
    pub fn permits(&self, at: &DateTime<Local>) -> bool {
        let time = at.time();
        self.times_on(at.date_naive())
            .iter()
            .any(|slot| slot.matches(time))
    }

    /// Concrete start instants strictly after `after` and no later than
    /// `until`, in chronological order.
    pub fn occurrences(&self, after: DateTime<Local>, until: DateTime<Local>) -> Vec<DateTime<Local>> {
        let mut out = Vec::new();
        let mut date = after.date_naive();
        let last = until.date_naive();

        while date <= last {
            for time in self.times_on(date) {
                if let Some(at) = local_datetime(date, time)
                    && at > after
                    && at <= until
                {
                    out.push(at);
                }
            }
            date += ChronoDuration::days(1);
        }

        out
    }
}

impl From<Vec<AvailabilitySlot>> for AvailabilitySet {
    fn from(slots: Vec<AvailabilitySlot>) -> Self {
        Self::new(slots)
    }
}

impl From<AvailabilitySet> for Vec<AvailabilitySlot> {
    fn from(set: AvailabilitySet) -> Self {
        set.0
    }
}

impl FromIterator<AvailabilitySlot> for AvailabilitySet {
    fn from_iter<I: IntoIterator<Item = AvailabilitySlot>>(iter: I) -> Self {
        Self::new(iter)
    }
}
