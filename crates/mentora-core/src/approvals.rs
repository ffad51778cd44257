//! Instructor schedule and profile approval workflows
//!
//! Instructors propose; staff approve or reject. At most one proposal of each
//! kind is pending per instructor, and scheduling only ever reads the last
//! approved availability.

use mentora_api::{Actor, AvailabilitySet, Instructor, ProfileChange};
use mentora_store::AuditEventType;
use mentora_util::{InstructorId, MentoraError, Result};
use tracing::info;

use crate::{CoreEvent, LifecycleEngine};

impl LifecycleEngine {
    /// Submit a new availability set for staff review
    pub fn propose_schedule(
        &self,
        actor: &Actor,
        instructor_id: &InstructorId,
        proposal: AvailabilitySet,
    ) -> Result<Instructor> {
        require_self(actor, instructor_id, "propose a schedule")?;
        if proposal.is_empty() {
            return Err(MentoraError::validation("proposed schedule has no slots"));
        }

        self.store.propose_schedule(instructor_id, &proposal)?;

        self.audit(AuditEventType::ScheduleProposed {
            instructor_id: instructor_id.clone(),
            slot_count: proposal.len(),
        });
        info!(instructor_id = %instructor_id, slots = proposal.len(), "Schedule proposed");
        self.emit(CoreEvent::ScheduleProposed {
            instructor_id: instructor_id.clone(),
        });

        self.load_instructor(instructor_id)
    }

    /// Replace the approved availability with the pending proposal
    pub fn approve_schedule(&self, actor: &Actor, instructor_id: &InstructorId) -> Result<Instructor> {
        require_reviewer(actor, "approve schedules")?;
        let instructor = self.store.approve_schedule(instructor_id)?;

        self.audit(AuditEventType::ScheduleApproved {
            instructor_id: instructor_id.clone(),
            actor: actor.clone(),
        });
        info!(
            instructor_id = %instructor_id,
            slots = instructor.availability.len(),
            "Schedule approved"
        );
        self.emit(CoreEvent::ScheduleReviewed {
            instructor_id: instructor_id.clone(),
            approved: true,
        });

        Ok(instructor)
    }

    /// Discard the pending proposal, keeping the approved availability
    pub fn reject_schedule(&self, actor: &Actor, instructor_id: &InstructorId) -> Result<Instructor> {
        require_reviewer(actor, "reject schedules")?;
        let instructor = self.store.reject_schedule(instructor_id)?;

        self.audit(AuditEventType::ScheduleRejected {
            instructor_id: instructor_id.clone(),
            actor: actor.clone(),
        });
        info!(instructor_id = %instructor_id, "Schedule rejected");
        self.emit(CoreEvent::ScheduleReviewed {
            instructor_id: instructor_id.clone(),
            approved: false,
        });

        Ok(instructor)
    }

    /// Submit a profile change for staff review
    pub fn propose_profile(
        &self,
        actor: &Actor,
        instructor_id: &InstructorId,
        change: ProfileChange,
    ) -> Result<Instructor> {
        require_self(actor, instructor_id, "propose a profile change")?;
        self.check_profile_change(&change)?;

        self.store.propose_profile(instructor_id, &change)?;

        self.audit(AuditEventType::ProfileProposed {
            instructor_id: instructor_id.clone(),
        });
        info!(instructor_id = %instructor_id, "Profile change proposed");
        self.emit(CoreEvent::ProfileProposed {
            instructor_id: instructor_id.clone(),
        });

        self.load_instructor(instructor_id)
    }

    /// Merge the pending profile change into the live profile
    pub fn approve_profile(&self, actor: &Actor, instructor_id: &InstructorId) -> Result<Instructor> {
        require_reviewer(actor, "approve profile changes")?;
        let instructor = self.store.approve_profile(instructor_id)?;

        self.audit(AuditEventType::ProfileApproved {
            instructor_id: instructor_id.clone(),
            actor: actor.clone(),
        });
        info!(instructor_id = %instructor_id, "Profile change approved");
        self.emit(CoreEvent::ProfileReviewed {
            instructor_id: instructor_id.clone(),
            approved: true,
        });

        Ok(instructor)
    }

    pub fn reject_profile(&self, actor: &Actor, instructor_id: &InstructorId) -> Result<Instructor> {
        require_reviewer(actor, "reject profile changes")?;
        let instructor = self.store.reject_profile(instructor_id)?;

        self.audit(AuditEventType::ProfileRejected {
            instructor_id: instructor_id.clone(),
            actor: actor.clone(),
        });
        info!(instructor_id = %instructor_id, "Profile change rejected");
        self.emit(CoreEvent::ProfileReviewed {
            instructor_id: instructor_id.clone(),
            approved: false,
        });

        Ok(instructor)
    }

    fn check_profile_change(&self, change: &ProfileChange) -> Result<()> {
        if change.is_empty() {
            return Err(MentoraError::validation("profile change is empty"));
        }
        if change
            .display_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(MentoraError::validation("display name must not be blank"));
        }

        for (package_id, rate) in &change.package_rates {
            if self.catalog().get_package(package_id).is_none() {
                return Err(MentoraError::validation(format!(
                    "rate for unknown package {}",
                    package_id
                )));
            }
            if rate.is_negative() {
                return Err(MentoraError::validation(format!(
                    "rate for package {} must not be negative",
                    package_id
                )));
            }
        }

        for (service_id, rate) in &change.service_rates {
            if self.catalog().get_service(service_id).is_none() {
                return Err(MentoraError::validation(format!(
                    "rate for unknown service {}",
                    service_id
                )));
            }
            if rate.is_negative() {
                return Err(MentoraError::validation(format!(
                    "rate for service {} must not be negative",
                    service_id
                )));
            }
        }

        Ok(())
    }
}

fn require_self(actor: &Actor, instructor_id: &InstructorId, action: &str) -> Result<()> {
    if actor.is_instructor(instructor_id) {
        Ok(())
    } else {
        Err(MentoraError::permission(format!(
            "only instructor {} may {}",
            instructor_id, action
        )))
    }
}

fn require_reviewer(actor: &Actor, action: &str) -> Result<()> {
    if actor.role().can_review_proposals() {
        Ok(())
    } else {
        Err(MentoraError::permission(format!("only staff may {}", action)))
    }
}
