//! Authenticated actors and role permissions

use mentora_util::{GuardianId, InstructorId, StaffId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The authenticated identity behind a command.
///
/// Passed explicitly into every engine call; nothing in the engine assumes a
/// "current" user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Guardian(GuardianId),
    Instructor(InstructorId),
    Staff(StaffId),
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Guardian,
    Instructor,
    Staff,
}

impl ActorRole {
    pub fn can_verify_payment(&self) -> bool {
        matches!(self, ActorRole::Staff)
    }

    pub fn can_mark_completion(&self) -> bool {
        matches!(self, ActorRole::Staff | ActorRole::Instructor)
    }

    pub fn can_review_proposals(&self) -> bool {
        matches!(self, ActorRole::Staff)
    }

    pub fn can_record_payout(&self) -> bool {
        matches!(self, ActorRole::Staff)
    }

    pub fn can_schedule_sessions(&self) -> bool {
        matches!(self, ActorRole::Staff)
    }
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Guardian(_) => ActorRole::Guardian,
            Actor::Instructor(_) => ActorRole::Instructor,
            Actor::Staff(_) => ActorRole::Staff,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Actor::Staff(_))
    }

    /// True when this actor is the given instructor
    pub fn is_instructor(&self, id: &InstructorId) -> bool {
        matches!(self, Actor::Instructor(own) if own == id)
    }

    /// True when this actor is the given guardian
    pub fn is_guardian(&self, id: &GuardianId) -> bool {
        matches!(self, Actor::Guardian(own) if own == id)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Guardian(id) => write!(f, "guardian:{}", id),
            Actor::Instructor(id) => write!(f, "instructor:{}", id),
            Actor::Staff(id) => write!(f, "staff:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_staff_verifies_payment() {
        assert!(ActorRole::Staff.can_verify_payment());
        assert!(!ActorRole::Instructor.can_verify_payment());
        assert!(!ActorRole::Guardian.can_verify_payment());
    }

    #[test]
    fn instructors_and_staff_mark_completion() {
        assert!(ActorRole::Staff.can_mark_completion());
        assert!(ActorRole::Instructor.can_mark_completion());
        assert!(!ActorRole::Guardian.can_mark_completion());
    }

    #[test]
    fn instructor_identity_is_checked() {
        let actor = Actor::Instructor(InstructorId::new("inst-1"));
        assert!(actor.is_instructor(&InstructorId::new("inst-1")));
        assert!(!actor.is_instructor(&InstructorId::new("inst-2")));
        assert_eq!(actor.to_string(), "instructor:inst-1");
    }

    #[test]
    fn actor_serialization() {
        let actor = Actor::Staff(StaffId::new("admin"));
        let json = serde_json::to_string(&actor).unwrap();
        assert_eq!(json, r#"{"role":"staff","id":"admin"}"#);
    }
}
