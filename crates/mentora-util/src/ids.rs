//! Strongly-typed identifiers for mentora
//!
//! People and catalog items carry externally assigned string IDs (they come
//! from the authenticated actor context or from configuration). Records the
//! engine creates itself get random UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

string_id!(
    /// Guardian (parent) account that purchases packages
    GuardianId
);
string_id!(
    /// Child enrolled under a guardian
    ChildId
);
string_id!(
    /// Instructor account
    InstructorId
);
string_id!(
    /// Staff (administrator) account
    StaffId
);
string_id!(
    /// Package in the catalog
    PackageId
);
string_id!(
    /// Standalone service in the catalog
    ServiceId
);

uuid_id!(
    /// A guardian's purchase of a package
    BookingId
);
uuid_id!(
    /// One scheduled occurrence of live instruction
    SessionId
);
uuid_id!(
    /// A standalone service order
    OrderId
);
uuid_id!(
    /// A payout ledger record
    PayoutId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_id_equality() {
        let a = InstructorId::new("inst-1");
        let b = InstructorId::from("inst-1");
        let c = InstructorId::new("inst-2");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn uuid_id_uniqueness() {
        assert_ne!(BookingId::new(), BookingId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn uuid_id_parses_its_display_form() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        assert!("not-a-uuid".parse::<BookingId>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = PackageId::new("individual-4");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"individual-4\"");

        let booking = BookingId::new();
        let json = serde_json::to_string(&booking).unwrap();
        let parsed: BookingId = serde_json::from_str(&json).unwrap();
        assert_eq!(booking, parsed);
    }
}
