//! Shared record types

use chrono::{DateTime, Local, NaiveDate};
use mentora_util::{
    BookingId, ChildId, GuardianId, InstructorId, Money, OrderId, PackageId, PayoutId, ServiceId,
    SessionId, StaffId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    ApprovalStatus, AvailabilitySet, BookingStatus, OrderStatus, ProfileApprovalStatus,
    SessionStatus,
};

/// Purchasable instruction package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub price: Money,
    /// Free-text descriptor as shown to guardians ("4 جلسات فردية")
    pub sessions_descriptor: String,
    /// Parsed from the descriptor when the catalog is loaded
    pub session_count: u32,
}

/// Standalone (non-package) service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub price: Money,
}

/// Free-text note on a child's progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressNote {
    pub written_at: DateTime<Local>,
    pub author: String,
    pub text: String,
}

/// A guardian's purchase of a package for a child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub guardian_id: GuardianId,
    pub child_id: ChildId,
    pub instructor_id: Option<InstructorId>,
    pub package_id: PackageId,
    pub status: BookingStatus,
    pub total_price: Money,
    pub receipt_ref: Option<String>,
    #[serde(default)]
    pub progress_notes: Vec<ProgressNote>,
    pub created_at: DateTime<Local>,
}

/// Input for creating a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub guardian_id: GuardianId,
    pub child_id: ChildId,
    pub instructor_id: Option<InstructorId>,
    pub package_id: PackageId,
}

/// One concrete occurrence of live instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub id: SessionId,
    pub booking_id: BookingId,
    pub child_id: ChildId,
    pub instructor_id: InstructorId,
    pub starts_at: DateTime<Local>,
    pub status: SessionStatus,
}

impl ScheduledSession {
    pub fn new(booking: &Booking, instructor_id: InstructorId, starts_at: DateTime<Local>) -> Self {
        Self {
            id: SessionId::new(),
            booking_id: booking.id,
            child_id: booking.child_id.clone(),
            instructor_id,
            starts_at,
            status: SessionStatus::Upcoming,
        }
    }
}

/// Per-instructor rate overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    /// Rate per session of a package
    #[serde(default)]
    pub packages: BTreeMap<PackageId, Money>,
    /// Rate per completed service order
    #[serde(default)]
    pub services: BTreeMap<ServiceId, Money>,
}

impl RateTable {
    pub fn package_rate(&self, id: &PackageId) -> Option<Money> {
        self.packages.get(id).copied()
    }

    pub fn service_rate(&self, id: &ServiceId) -> Option<Money> {
        self.services.get(id).copied()
    }
}

/// Instructor-proposed profile change, applied only as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChange {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub package_rates: BTreeMap<PackageId, Money>,
    #[serde(default)]
    pub service_rates: BTreeMap<ServiceId, Money>,
}

impl ProfileChange {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.package_rates.is_empty()
            && self.service_rates.is_empty()
    }
}

/// Instructor record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub display_name: String,
    pub bio: Option<String>,
    /// Last approved availability; the only set scheduling reads
    pub availability: AvailabilitySet,
    pub schedule_status: ApprovalStatus,
    pub pending_schedule: Option<AvailabilitySet>,
    pub rates: RateTable,
    pub pending_profile: Option<ProfileChange>,
}

impl Instructor {
    pub fn new(id: InstructorId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            bio: None,
            availability: AvailabilitySet::default(),
            schedule_status: ApprovalStatus::None,
            pending_schedule: None,
            rates: RateTable::default(),
            pending_profile: None,
        }
    }

    pub fn profile_status(&self) -> ProfileApprovalStatus {
        if self.pending_profile.is_some() {
            ProfileApprovalStatus::Pending
        } else {
            ProfileApprovalStatus::None
        }
    }

    /// Merge a profile change into the live fields
    pub fn apply_profile_change(&mut self, change: ProfileChange) {
        if let Some(name) = change.display_name {
            self.display_name = name;
        }
        if let Some(bio) = change.bio {
            self.bio = Some(bio);
        }
        self.rates.packages.extend(change.package_rates);
        self.rates.services.extend(change.service_rates);
    }
}

/// Payout ledger record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: PayoutId,
    pub instructor_id: InstructorId,
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub memo: String,
    pub recorded_by: StaffId,
}

/// Standalone service order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: OrderId,
    pub guardian_id: GuardianId,
    pub instructor_id: InstructorId,
    pub service_id: ServiceId,
    pub price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_change_merges_every_field() {
        let mut instructor = Instructor::new(InstructorId::new("inst-1"), "Old Name");
        instructor
            .rates
            .packages
            .insert(PackageId::new("p1"), Money::from_major(150));

        let mut change = ProfileChange {
            display_name: Some("New Name".into()),
            bio: Some("Quran and tajweed".into()),
            ..Default::default()
        };
        change.package_rates.insert(PackageId::new("p1"), Money::from_major(200));
        change.package_rates.insert(PackageId::new("p2"), Money::from_major(90));

        instructor.apply_profile_change(change);

        assert_eq!(instructor.display_name, "New Name");
        assert_eq!(instructor.bio.as_deref(), Some("Quran and tajweed"));
        assert_eq!(instructor.rates.package_rate(&PackageId::new("p1")), Some(Money::from_major(200)));
        assert_eq!(instructor.rates.package_rate(&PackageId::new("p2")), Some(Money::from_major(90)));
    }

    #[test]
    fn profile_status_follows_pending_payload() {
        let mut instructor = Instructor::new(InstructorId::new("inst-1"), "Name");
        assert_eq!(instructor.profile_status(), ProfileApprovalStatus::None);
        instructor.pending_profile = Some(ProfileChange::default());
        assert_eq!(instructor.profile_status(), ProfileApprovalStatus::Pending);
    }
}
