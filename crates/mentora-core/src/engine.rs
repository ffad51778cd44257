//! Core lifecycle engine

use chrono::{DateTime, Local, NaiveDate};
use mentora_api::{
    Actor, Booking, BookingStatus, Instructor, NewBooking, OrderStatus, Package, Payout,
    ProgressNote, ServiceOrder,
};
use mentora_config::{Catalog, Settings};
use mentora_store::{AuditEvent, AuditEventType, Store};
use mentora_util::{
    BookingId, GuardianId, InstructorId, MentoraError, Money, OrderId, PackageId, PayoutId,
    Result, ServiceId,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::CoreEvent;

/// The booking-to-session lifecycle engine.
///
/// Every command takes the acting identity explicitly. Time-dependent
/// commands take `now` so callers decide which clock drives them.
pub struct LifecycleEngine {
    pub(crate) settings: Settings,
    pub(crate) store: Arc<dyn Store>,
    events: mpsc::UnboundedSender<CoreEvent>,
    subscriber: Mutex<Option<mpsc::UnboundedReceiver<CoreEvent>>>,
}

impl LifecycleEngine {
    /// Create a new engine
    pub fn new(settings: Settings, store: Arc<dyn Store>) -> Self {
        info!(
            packages = settings.catalog.packages.len(),
            services = settings.catalog.services.len(),
            instructors = settings.instructors.len(),
            "Lifecycle engine initialized"
        );

        let _ = store.append_audit(AuditEvent::new(AuditEventType::SettingsLoaded {
            package_count: settings.catalog.packages.len(),
            instructor_count: settings.instructors.len(),
        }));

        let (events, receiver) = mpsc::unbounded_channel();

        Self {
            settings,
            store,
            events,
            subscriber: Mutex::new(Some(receiver)),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.settings.catalog
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Take the event stream. Only the first caller receives it; events
    /// queue until then.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<CoreEvent>> {
        self.subscriber.lock().ok()?.take()
    }

    /// Insert configured instructors that the store does not know yet
    pub fn seed_instructors(&self) -> Result<usize> {
        let mut inserted = 0;
        for instructor in &self.settings.instructors {
            if self.store.insert_instructor_if_absent(instructor)? {
                inserted += 1;
                self.audit(AuditEventType::InstructorSeeded {
                    instructor_id: instructor.id.clone(),
                });
                info!(instructor_id = %instructor.id, "Instructor seeded from config");
            }
        }
        Ok(inserted)
    }

    // Bookings

    /// Record a guardian's purchase of a package
    pub fn create_booking(
        &self,
        actor: &Actor,
        new: NewBooking,
        now: DateTime<Local>,
    ) -> Result<Booking> {
        if !(actor.is_staff() || actor.is_guardian(&new.guardian_id)) {
            return Err(MentoraError::permission(
                "a booking can only be created by its guardian or staff",
            ));
        }

        let package = self.package(&new.package_id)?;
        if let Some(instructor_id) = &new.instructor_id {
            self.load_instructor(instructor_id)?;
        }

        let booking = Booking {
            id: BookingId::new(),
            guardian_id: new.guardian_id,
            child_id: new.child_id,
            instructor_id: new.instructor_id,
            package_id: new.package_id,
            status: BookingStatus::AwaitingPayment,
            total_price: package.price,
            receipt_ref: None,
            progress_notes: Vec::new(),
            created_at: now,
        };
        self.store.insert_booking(&booking)?;

        self.audit(AuditEventType::BookingCreated {
            booking_id: booking.id,
            guardian_id: booking.guardian_id.clone(),
            package_id: booking.package_id.clone(),
        });
        info!(
            booking_id = %booking.id,
            package_id = %booking.package_id,
            price = %booking.total_price,
            "Booking created"
        );
        self.emit(CoreEvent::BookingCreated {
            booking_id: booking.id,
            guardian_id: booking.guardian_id.clone(),
            package_id: booking.package_id.clone(),
        });

        Ok(booking)
    }

    /// Store the payment receipt reference while payment is pending
    pub fn attach_receipt(&self, actor: &Actor, id: &BookingId, receipt: &str) -> Result<Booking> {
        let booking = self.load_booking(id)?;
        if !(actor.is_staff() || actor.is_guardian(&booking.guardian_id)) {
            return Err(MentoraError::permission(
                "only the booking's guardian or staff may attach a receipt",
            ));
        }

        let receipt = receipt.trim();
        if receipt.is_empty() {
            return Err(MentoraError::validation("receipt reference is empty"));
        }
        if booking.status != BookingStatus::AwaitingPayment {
            return Err(MentoraError::conflict(format!(
                "booking {} is {}, receipts are accepted only while awaiting payment",
                id,
                booking.status.as_tag()
            )));
        }

        self.store
            .set_receipt(id, BookingStatus::AwaitingPayment, receipt)?;
        self.audit(AuditEventType::ReceiptAttached {
            booking_id: *id,
            actor: actor.clone(),
        });
        debug!(booking_id = %id, "Receipt attached");

        self.load_booking(id)
    }

    /// Assign or replace the instructor before payment is verified
    pub fn assign_instructor(
        &self,
        actor: &Actor,
        id: &BookingId,
        instructor_id: &InstructorId,
    ) -> Result<Booking> {
        require_staff(actor, "assign instructors")?;

        let booking = self.load_booking(id)?;
        self.load_instructor(instructor_id)?;

        if booking.status != BookingStatus::AwaitingPayment {
            return Err(MentoraError::conflict(format!(
                "booking {} is {}, instructors are assigned only before confirmation",
                id,
                booking.status.as_tag()
            )));
        }

        self.store
            .assign_instructor(id, BookingStatus::AwaitingPayment, instructor_id)?;
        self.audit(AuditEventType::InstructorAssigned {
            booking_id: *id,
            instructor_id: instructor_id.clone(),
            actor: actor.clone(),
        });
        info!(booking_id = %id, instructor_id = %instructor_id, "Instructor assigned");

        self.load_booking(id)
    }

    /// Cancel a booking that has not completed.
    ///
    /// `expected` is the status the caller last saw; a booking that has moved
    /// on since is a conflict. Returns how many upcoming sessions were released.
    pub fn cancel_booking(
        &self,
        actor: &Actor,
        id: &BookingId,
        expected: BookingStatus,
    ) -> Result<usize> {
        let booking = self.load_booking(id)?;
        if !(actor.is_staff() || actor.is_guardian(&booking.guardian_id)) {
            return Err(MentoraError::permission(
                "only the booking's guardian or staff may cancel it",
            ));
        }
        check_booking_status(&booking, expected)?;

        match booking.status {
            BookingStatus::Completed => {
                return Err(MentoraError::conflict(format!(
                    "booking {} is completed and can no longer be cancelled",
                    id
                )));
            }
            BookingStatus::Cancelled => {
                return Err(MentoraError::conflict(format!(
                    "booking {} is already cancelled",
                    id
                )));
            }
            BookingStatus::AwaitingPayment | BookingStatus::Confirmed => {}
        }

        let removed_sessions = self.store.cancel_booking(id, expected)?;

        self.audit(AuditEventType::BookingCancelled {
            booking_id: *id,
            actor: actor.clone(),
            removed_sessions,
        });
        info!(booking_id = %id, removed_sessions, actor = %actor, "Booking cancelled");
        self.emit(CoreEvent::BookingCancelled {
            booking_id: *id,
            removed_sessions,
        });

        Ok(removed_sessions)
    }

    /// Append a note on the child's progress
    pub fn add_progress_note(
        &self,
        actor: &Actor,
        id: &BookingId,
        text: &str,
        now: DateTime<Local>,
    ) -> Result<Booking> {
        let booking = self.load_booking(id)?;
        if !(actor.is_staff() || is_assigned_instructor(actor, &booking)) {
            return Err(MentoraError::permission(
                "only staff or the assigned instructor may write progress notes",
            ));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(MentoraError::validation("progress note is empty"));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(MentoraError::conflict(format!("booking {} is cancelled", id)));
        }

        let note = ProgressNote {
            written_at: now,
            author: actor.to_string(),
            text: text.to_string(),
        };
        self.store.add_progress_note(id, &note)?;
        self.audit(AuditEventType::ProgressNoteAdded {
            booking_id: *id,
            actor: actor.clone(),
        });

        self.load_booking(id)
    }

    /// A booking visible to the actor
    pub fn get_booking(&self, actor: &Actor, id: &BookingId) -> Result<Booking> {
        let booking = self.load_booking(id)?;
        if !can_view_booking(actor, &booking) {
            return Err(MentoraError::permission(format!(
                "{} may not view booking {}",
                actor, id
            )));
        }
        Ok(booking)
    }

    /// Every booking the actor may see
    pub fn bookings_for(&self, actor: &Actor) -> Result<Vec<Booking>> {
        Ok(self
            .store
            .list_bookings()?
            .into_iter()
            .filter(|b| can_view_booking(actor, b))
            .collect())
    }

    // Instructors

    pub fn get_instructor(&self, id: &InstructorId) -> Result<Instructor> {
        self.load_instructor(id)
    }

    pub fn list_instructors(&self) -> Result<Vec<Instructor>> {
        Ok(self.store.list_instructors()?)
    }

    // Service orders

    /// Order a standalone service
    pub fn create_service_order(
        &self,
        actor: &Actor,
        guardian_id: &GuardianId,
        instructor_id: &InstructorId,
        service_id: &ServiceId,
        now: DateTime<Local>,
    ) -> Result<ServiceOrder> {
        if !(actor.is_staff() || actor.is_guardian(guardian_id)) {
            return Err(MentoraError::permission(
                "a service order can only be placed by its guardian or staff",
            ));
        }

        let service = self
            .settings
            .catalog
            .get_service(service_id)
            .ok_or_else(|| MentoraError::not_found(format!("service {}", service_id)))?;
        self.load_instructor(instructor_id)?;

        let order = ServiceOrder {
            id: OrderId::new(),
            guardian_id: guardian_id.clone(),
            instructor_id: instructor_id.clone(),
            service_id: service_id.clone(),
            price: service.price,
            status: OrderStatus::Open,
            created_at: now,
        };
        self.store.insert_order(&order)?;

        self.audit(AuditEventType::OrderCreated {
            order_id: order.id,
            service_id: order.service_id.clone(),
            instructor_id: order.instructor_id.clone(),
        });
        info!(order_id = %order.id, service_id = %order.service_id, "Service order created");
        self.emit(CoreEvent::OrderUpdated {
            order_id: order.id,
            status: order.status,
        });

        Ok(order)
    }

    /// Mark an open order as delivered
    pub fn complete_order(&self, actor: &Actor, id: &OrderId) -> Result<ServiceOrder> {
        let order = self.load_order(id)?;
        if !(actor.is_staff() || actor.is_instructor(&order.instructor_id)) {
            return Err(MentoraError::permission(
                "only staff or the order's instructor may complete it",
            ));
        }

        self.move_order(actor, order, OrderStatus::Completed)
    }

    /// Cancel an open order
    pub fn cancel_order(&self, actor: &Actor, id: &OrderId) -> Result<ServiceOrder> {
        let order = self.load_order(id)?;
        if !(actor.is_staff() || actor.is_guardian(&order.guardian_id)) {
            return Err(MentoraError::permission(
                "only staff or the ordering guardian may cancel an order",
            ));
        }

        self.move_order(actor, order, OrderStatus::Cancelled)
    }

    fn move_order(
        &self,
        actor: &Actor,
        mut order: ServiceOrder,
        next: OrderStatus,
    ) -> Result<ServiceOrder> {
        if order.status != OrderStatus::Open {
            return Err(MentoraError::conflict(format!(
                "order {} is {}, only open orders change",
                order.id,
                order.status.as_tag()
            )));
        }

        self.store
            .transition_order(&order.id, OrderStatus::Open, next)?;
        order.status = next;

        let event = match next {
            OrderStatus::Completed => AuditEventType::OrderCompleted {
                order_id: order.id,
                actor: actor.clone(),
            },
            _ => AuditEventType::OrderCancelled {
                order_id: order.id,
                actor: actor.clone(),
            },
        };
        self.audit(event);
        info!(order_id = %order.id, status = next.as_tag(), "Service order updated");
        self.emit(CoreEvent::OrderUpdated {
            order_id: order.id,
            status: next,
        });

        Ok(order)
    }

    // Ledger

    /// Record a payment made to an instructor
    pub fn record_payout(
        &self,
        actor: &Actor,
        instructor_id: &InstructorId,
        amount: Money,
        paid_on: NaiveDate,
        memo: &str,
    ) -> Result<Payout> {
        let Actor::Staff(staff_id) = actor else {
            return Err(MentoraError::permission("only staff may record payouts"));
        };
        if !amount.is_positive() {
            return Err(MentoraError::validation(format!(
                "payout amount must be positive, got {}",
                amount
            )));
        }
        self.load_instructor(instructor_id)?;

        let payout = Payout {
            id: PayoutId::new(),
            instructor_id: instructor_id.clone(),
            amount,
            paid_on,
            memo: memo.trim().to_string(),
            recorded_by: staff_id.clone(),
        };
        self.store.insert_payout(&payout)?;

        self.audit(AuditEventType::PayoutRecorded {
            payout_id: payout.id,
            instructor_id: instructor_id.clone(),
            amount,
            actor: actor.clone(),
        });
        info!(instructor_id = %instructor_id, amount = %amount, "Payout recorded");
        self.emit(CoreEvent::PayoutRecorded {
            instructor_id: instructor_id.clone(),
            amount,
        });

        Ok(payout)
    }

    /// Most recent audit records, newest first
    pub fn recent_audits(&self, actor: &Actor, limit: usize) -> Result<Vec<AuditEvent>> {
        require_staff(actor, "read the audit log")?;
        Ok(self.store.get_recent_audits(limit)?)
    }

    // Shared helpers

    pub(crate) fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    pub(crate) fn emit(&self, event: CoreEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn package(&self, id: &PackageId) -> Result<&Package> {
        self.settings
            .catalog
            .get_package(id)
            .ok_or_else(|| MentoraError::not_found(format!("package {}", id)))
    }

    pub(crate) fn load_booking(&self, id: &BookingId) -> Result<Booking> {
        self.store
            .get_booking(id)?
            .ok_or_else(|| MentoraError::not_found(format!("booking {}", id)))
    }

    pub(crate) fn load_instructor(&self, id: &InstructorId) -> Result<Instructor> {
        self.store
            .get_instructor(id)?
            .ok_or_else(|| MentoraError::not_found(format!("instructor {}", id)))
    }

    fn load_order(&self, id: &OrderId) -> Result<ServiceOrder> {
        self.store
            .get_order(id)?
            .ok_or_else(|| MentoraError::not_found(format!("order {}", id)))
    }
}

/// The caller's view of a booking must still be current
pub(crate) fn check_booking_status(booking: &Booking, expected: BookingStatus) -> Result<()> {
    if booking.status != expected {
        return Err(MentoraError::conflict(format!(
            "booking {} is {}, not {} as expected",
            booking.id,
            booking.status.as_tag(),
            expected.as_tag()
        )));
    }
    Ok(())
}

fn require_staff(actor: &Actor, action: &str) -> Result<()> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(MentoraError::permission(format!("only staff may {}", action)))
    }
}

fn is_assigned_instructor(actor: &Actor, booking: &Booking) -> bool {
    booking
        .instructor_id
        .as_ref()
        .is_some_and(|id| actor.is_instructor(id))
}

fn can_view_booking(actor: &Actor, booking: &Booking) -> bool {
    match actor {
        Actor::Staff(_) => true,
        Actor::Guardian(id) => &booking.guardian_id == id,
        Actor::Instructor(_) => is_assigned_instructor(actor, booking),
    }
}
