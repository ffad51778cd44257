//! Instructor settlement
//!
//! Earnings are derived on demand from completed bookings and completed
//! service orders, priced with the instructor's rate overrides. Nothing is
//! cached: every statement is recomputed from the store.

use chrono::{DateTime, Local};
use mentora_api::{Actor, Booking, BookingStatus, Instructor, OrderStatus, Payout, ServiceOrder};
use mentora_config::Catalog;
use mentora_util::{BookingId, InstructorId, MentoraError, Money, OrderId, PackageId, Result, ServiceId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::LifecycleEngine;

/// Data problem found while settling; never fatal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// Completed booking whose package has no rate override; counted as 0
    MissingPackageRate {
        booking_id: BookingId,
        package_id: PackageId,
    },
    /// Completed order whose service has no rate override; counted as 0
    MissingServiceRate {
        order_id: OrderId,
        service_id: ServiceId,
    },
    /// Completed booking for a package no longer in the catalog
    UnknownPackage {
        booking_id: BookingId,
        package_id: PackageId,
    },
    /// More has been paid out than earned
    NegativeBalance { outstanding: Money },
    /// An amount left the representable range; the term was not counted
    Overflow { item: String },
}

/// One instructor's statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructorSettlement {
    pub instructor_id: InstructorId,
    pub display_name: String,
    pub completed_bookings: usize,
    pub completed_orders: usize,
    pub total_earnings: Money,
    pub total_paid: Money,
    pub outstanding: Money,
    /// Payout history, oldest first
    pub payouts: Vec<Payout>,
    pub issues: Vec<IntegrityIssue>,
}

/// Statements for every instructor
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub generated_at: DateTime<Local>,
    pub instructors: Vec<InstructorSettlement>,
    pub total_outstanding: Money,
}

/// Settle one instructor from already-loaded records.
///
/// Bookings and orders may include other instructors' records; only the
/// instructor's own Completed ones count.
pub fn compute_settlement(
    instructor: &Instructor,
    catalog: &Catalog,
    bookings: &[Booking],
    orders: &[ServiceOrder],
    mut payouts: Vec<Payout>,
) -> InstructorSettlement {
    let mut issues = Vec::new();
    let mut total_earnings = Money::ZERO;

    let completed_bookings: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
        .filter(|b| b.instructor_id.as_ref() == Some(&instructor.id))
        .collect();

    for booking in &completed_bookings {
        let Some(package) = catalog.get_package(&booking.package_id) else {
            issues.push(IntegrityIssue::UnknownPackage {
                booking_id: booking.id,
                package_id: booking.package_id.clone(),
            });
            continue;
        };
        match instructor.rates.package_rate(&package.id) {
            Some(rate) => {
                let earned = rate.checked_mul(package.session_count);
                accumulate(&mut total_earnings, earned, &mut issues, || {
                    format!("booking {}", booking.id)
                });
            }
            None => issues.push(IntegrityIssue::MissingPackageRate {
                booking_id: booking.id,
                package_id: package.id.clone(),
            }),
        }
    }

    let completed_orders: Vec<&ServiceOrder> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Completed && o.instructor_id == instructor.id)
        .collect();

    for order in &completed_orders {
        match instructor.rates.service_rate(&order.service_id) {
            Some(rate) => {
                accumulate(&mut total_earnings, Some(rate), &mut issues, || {
                    format!("order {}", order.id)
                });
            }
            None => issues.push(IntegrityIssue::MissingServiceRate {
                order_id: order.id,
                service_id: order.service_id.clone(),
            }),
        }
    }

    payouts.retain(|p| p.instructor_id == instructor.id);
    payouts.sort_by_key(|p| p.paid_on);
    let mut total_paid = Money::ZERO;
    for payout in &payouts {
        accumulate(&mut total_paid, Some(payout.amount), &mut issues, || {
            format!("payout {}", payout.id)
        });
    }

    let outstanding = match total_earnings.checked_sub(total_paid) {
        Some(outstanding) => outstanding,
        None => {
            issues.push(IntegrityIssue::Overflow {
                item: "outstanding balance".into(),
            });
            total_earnings - total_paid
        }
    };
    if outstanding.is_negative() {
        issues.push(IntegrityIssue::NegativeBalance { outstanding });
    }

    InstructorSettlement {
        instructor_id: instructor.id.clone(),
        display_name: instructor.display_name.clone(),
        completed_bookings: completed_bookings.len(),
        completed_orders: completed_orders.len(),
        total_earnings,
        total_paid,
        outstanding,
        payouts,
        issues,
    }
}

/// Add `amount` to `total`, or record an overflow and leave `total` as is
fn accumulate(
    total: &mut Money,
    amount: Option<Money>,
    issues: &mut Vec<IntegrityIssue>,
    item: impl FnOnce() -> String,
) {
    match amount.and_then(|a| total.checked_add(a)) {
        Some(sum) => *total = sum,
        None => issues.push(IntegrityIssue::Overflow { item: item() }),
    }
}

impl LifecycleEngine {
    /// Statement for one instructor; staff or the instructor themself
    pub fn settlement_for(
        &self,
        actor: &Actor,
        instructor_id: &InstructorId,
    ) -> Result<InstructorSettlement> {
        if !(actor.is_staff() || actor.is_instructor(instructor_id)) {
            return Err(MentoraError::permission(format!(
                "{} may not read instructor {}'s settlement",
                actor, instructor_id
            )));
        }

        let instructor = self.load_instructor(instructor_id)?;
        let bookings = self.store.list_bookings()?;
        self.settle(&instructor, &bookings)
    }

    /// Statements for every instructor; staff only
    pub fn settlement_report(&self, actor: &Actor, now: DateTime<Local>) -> Result<SettlementReport> {
        if !actor.is_staff() {
            return Err(MentoraError::permission(
                "only staff may read the settlement report",
            ));
        }

        let bookings = self.store.list_bookings()?;
        let instructors = self
            .store
            .list_instructors()?
            .iter()
            .map(|instructor| self.settle(instructor, &bookings))
            .collect::<Result<Vec<_>>>()?;

        let total_outstanding: Money = instructors.iter().map(|s| s.outstanding).sum();
        debug!(instructors = instructors.len(), total_outstanding = %total_outstanding, "Settlement report built");

        Ok(SettlementReport {
            generated_at: now,
            instructors,
            total_outstanding,
        })
    }

    fn settle(&self, instructor: &Instructor, bookings: &[Booking]) -> Result<InstructorSettlement> {
        let orders = self.store.orders_for_instructor(&instructor.id)?;
        let payouts = self.store.payouts_for_instructor(&instructor.id)?;
        let settlement = compute_settlement(instructor, self.catalog(), bookings, &orders, payouts);

        for issue in &settlement.issues {
            warn!(instructor_id = %instructor.id, issue = ?issue, "Settlement integrity issue");
        }
        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::*;
    use chrono::NaiveDate;
    use mentora_api::SessionStatus;
    use mentora_util::{ChildId, GuardianId, PayoutId, StaffId};

    fn paid_on(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, day).unwrap()
    }

    fn payout(instructor: &str, amount: i64, day: u32) -> Payout {
        Payout {
            id: PayoutId::new(),
            instructor_id: InstructorId::new(instructor),
            amount: Money::from_major(amount),
            paid_on: paid_on(day),
            memo: String::new(),
            recorded_by: StaffId::new("staff-1"),
        }
    }

    fn completed_booking(package: &str) -> Booking {
        Booking {
            id: BookingId::new(),
            guardian_id: GuardianId::new("guardian-1"),
            child_id: ChildId::new("child-1"),
            instructor_id: Some(InstructorId::new("inst-1")),
            package_id: PackageId::new(package),
            status: BookingStatus::Completed,
            total_price: Money::from_major(800),
            receipt_ref: None,
            progress_notes: Vec::new(),
            created_at: monday_morning(),
        }
    }

    fn complete_all(engine: &LifecycleEngine, package: &str) -> BookingId {
        let booking = engine
            .create_booking(&guardian(), new_booking(package), monday_morning())
            .unwrap();
        let sessions = engine
            .verify_payment(&staff(), &booking.id, BookingStatus::AwaitingPayment, monday_morning())
            .unwrap();
        for session in &sessions {
            engine
                .mark_session_completed(
                    &instructor_actor(),
                    &session.id,
                    SessionStatus::Upcoming,
                    session.starts_at,
                )
                .unwrap();
        }
        booking.id
    }

    #[test]
    fn test_four_session_package_settles_at_per_session_rate() {
        let engine = make_engine();
        let booking_id = complete_all(&engine, "individual-4");
        assert_eq!(
            engine.get_booking(&staff(), &booking_id).unwrap().status,
            BookingStatus::Completed
        );

        let inst = InstructorId::new("inst-1");
        let statement = engine.settlement_for(&instructor_actor(), &inst).unwrap();
        assert_eq!(statement.total_earnings, Money::from_major(800));
        assert_eq!(statement.outstanding, Money::from_major(800));

        engine
            .record_payout(&staff(), &inst, Money::from_major(300), paid_on(2), "November")
            .unwrap();

        let statement = engine.settlement_for(&staff(), &inst).unwrap();
        assert_eq!(statement.completed_bookings, 1);
        assert_eq!(statement.total_paid, Money::from_major(300));
        assert_eq!(statement.outstanding, Money::from_major(500));
        assert_eq!(statement.payouts.len(), 1);
        assert!(statement.issues.is_empty());
    }

    #[test]
    fn test_unfinished_bookings_earn_nothing() {
        let engine = make_engine();
        let booking = engine
            .create_booking(&guardian(), new_booking("individual-4"), monday_morning())
            .unwrap();
        let sessions = engine
            .verify_payment(&staff(), &booking.id, BookingStatus::AwaitingPayment, monday_morning())
            .unwrap();
        engine
            .mark_session_completed(
                &staff(),
                &sessions[0].id,
                SessionStatus::Upcoming,
                sessions[0].starts_at,
            )
            .unwrap();

        let statement = engine
            .settlement_for(&staff(), &InstructorId::new("inst-1"))
            .unwrap();
        assert_eq!(statement.total_earnings, Money::ZERO);
        assert_eq!(statement.completed_bookings, 0);
    }

    #[test]
    fn test_payout_order_does_not_change_balance() {
        let engine = make_engine();
        let instructor = engine.get_instructor(&InstructorId::new("inst-1")).unwrap();
        let bookings = vec![completed_booking("individual-4"), completed_booking("individual-4")];
        let payouts = vec![
            payout("inst-1", 300, 9),
            payout("inst-1", 450, 1),
            payout("inst-1", 100, 5),
        ];
        let mut reversed = payouts.clone();
        reversed.reverse();

        let a = compute_settlement(&instructor, engine.catalog(), &bookings, &[], payouts);
        let b = compute_settlement(&instructor, engine.catalog(), &bookings, &[], reversed);

        assert_eq!(a.outstanding, Money::from_major(1600 - 850));
        assert_eq!(a.outstanding, b.outstanding);
        assert_eq!(a.payouts, b.payouts);
        assert_eq!(a.payouts[0].paid_on, paid_on(1));
    }

    #[test]
    fn test_missing_rates_are_reported_not_raised() {
        let engine = make_engine();
        let instructor = engine.get_instructor(&InstructorId::new("inst-1")).unwrap();
        let bookings = vec![
            completed_booking("individual-4"),
            completed_booking("trial"),
            completed_booking("retired-package"),
        ];

        let statement =
            compute_settlement(&instructor, engine.catalog(), &bookings, &[], Vec::new());

        assert_eq!(statement.total_earnings, Money::from_major(800));
        assert_eq!(statement.completed_bookings, 3);
        assert!(statement.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::MissingPackageRate { package_id, .. } if package_id.as_str() == "trial"
        )));
        assert!(statement.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::UnknownPackage { package_id, .. } if package_id.as_str() == "retired-package"
        )));
    }

    #[test]
    fn test_overpayment_is_flagged() {
        let engine = make_engine();
        let instructor = engine.get_instructor(&InstructorId::new("inst-1")).unwrap();

        let statement = compute_settlement(
            &instructor,
            engine.catalog(),
            &[],
            &[],
            vec![payout("inst-1", 50, 3), payout("inst-2", 999, 3)],
        );

        assert_eq!(statement.total_paid, Money::from_major(50));
        assert_eq!(
            statement.issues,
            vec![IntegrityIssue::NegativeBalance {
                outstanding: Money::from_major(-50)
            }]
        );
    }

    #[test]
    fn test_overflowing_rate_is_reported_not_raised() {
        let engine = make_engine();
        let mut instructor = engine.get_instructor(&InstructorId::new("inst-1")).unwrap();
        instructor
            .rates
            .packages
            .insert(PackageId::new("trial"), Money::from_minor(i64::MAX / 2));
        let huge = completed_booking("individual-4");
        instructor
            .rates
            .packages
            .insert(PackageId::new("individual-4"), Money::from_minor(i64::MAX / 2));
        let bookings = vec![completed_booking("trial"), huge.clone()];

        let statement = compute_settlement(
            &instructor,
            engine.catalog(),
            &bookings,
            &[],
            vec![payout("inst-1", 100, 2)],
        );

        // The one-session trial still counts; the 4-session product does not fit
        assert_eq!(statement.total_earnings, Money::from_minor(i64::MAX / 2));
        assert_eq!(
            statement.outstanding,
            Money::from_minor(i64::MAX / 2) - Money::from_major(100)
        );
        assert_eq!(
            statement.issues,
            vec![IntegrityIssue::Overflow {
                item: format!("booking {}", huge.id)
            }]
        );
    }

    #[test]
    fn test_completed_orders_add_service_rate() {
        let engine = make_engine();
        let inst = InstructorId::new("inst-1");
        let open = engine
            .create_service_order(
                &guardian(),
                &GuardianId::new("guardian-1"),
                &inst,
                &ServiceId::new("assessment"),
                monday_morning(),
            )
            .unwrap();
        engine
            .create_service_order(
                &guardian(),
                &GuardianId::new("guardian-1"),
                &inst,
                &ServiceId::new("assessment"),
                monday_morning(),
            )
            .unwrap();
        engine.complete_order(&staff(), &open.id).unwrap();

        let statement = engine.settlement_for(&staff(), &inst).unwrap();
        assert_eq!(statement.completed_orders, 1);
        assert_eq!(statement.total_earnings, Money::from_major(100));
    }

    #[test]
    fn test_settlement_access() {
        let engine = make_engine();
        let inst = InstructorId::new("inst-1");
        let other = Actor::Instructor(InstructorId::new("inst-2"));

        assert!(matches!(
            engine.settlement_for(&other, &inst),
            Err(MentoraError::PermissionDenied(_))
        ));
        assert!(matches!(
            engine.settlement_for(&guardian(), &inst),
            Err(MentoraError::PermissionDenied(_))
        ));
        assert!(matches!(
            engine.settlement_report(&instructor_actor(), monday_morning()),
            Err(MentoraError::PermissionDenied(_))
        ));

        complete_all(&engine, "individual-4");
        let report = engine.settlement_report(&staff(), monday_morning()).unwrap();
        assert_eq!(report.instructors.len(), 1);
        assert_eq!(report.total_outstanding, Money::from_major(800));
    }
}
