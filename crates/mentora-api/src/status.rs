//! Status enums
//!
//! Every status is a closed enum. Storage and JSON use the stable snake_case
//! tag; the Arabic literals shown to guardians and staff are a display
//! mapping only and never drive logic.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $tag:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Stable storage tag
            pub fn as_tag(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag,)+
                }
            }

            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $($tag => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Display label
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn from_label(label: &str) -> Option<Self> {
                let label = label.trim();
                Self::ALL.iter().copied().find(|s| s.label() == label)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

status_enum!(
    /// Overall status of a booking
    BookingStatus {
        AwaitingPayment => "awaiting_payment", "بانتظار الدفع";
        Confirmed => "confirmed", "مؤكد";
        Completed => "completed", "مكتمل";
        Cancelled => "cancelled", "ملغي";
    }
);

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

status_enum!(
    /// Status of one scheduled session
    SessionStatus {
        Upcoming => "upcoming", "قادمة";
        Completed => "completed", "مكتملة";
        Missed => "missed", "فائتة";
    }
);

impl SessionStatus {
    /// Completed and Missed sessions can never be joined again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Upcoming)
    }
}

status_enum!(
    /// Staff approval state of an instructor's schedule
    ApprovalStatus {
        None => "none", "لا يوجد";
        Pending => "pending", "بانتظار الموافقة";
        Approved => "approved", "تمت الموافقة";
    }
);

status_enum!(
    /// Staff approval state of an instructor's profile changes
    ProfileApprovalStatus {
        None => "none", "لا يوجد";
        Pending => "pending", "بانتظار الموافقة";
    }
);

status_enum!(
    /// Status of a standalone service order
    OrderStatus {
        Open => "open", "قيد التنفيذ";
        Completed => "completed", "مكتمل";
        Cancelled => "cancelled", "ملغي";
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_both_ways() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::from_label(status.label()), Some(*status));
            assert_eq!(BookingStatus::from_tag(status.as_tag()), Some(*status));
        }
        assert_eq!(
            BookingStatus::from_label("بانتظار الدفع"),
            Some(BookingStatus::AwaitingPayment)
        );
        assert_eq!(SessionStatus::from_label("فائتة"), Some(SessionStatus::Missed));
    }

    #[test]
    fn unknown_literals_are_rejected() {
        // a typo no longer creates an unreachable state
        assert_eq!(BookingStatus::from_label("بانتظار الدفغ"), None);
        assert_eq!(SessionStatus::from_tag("Upcoming"), None);
    }

    #[test]
    fn serde_uses_storage_tags() {
        for status in SessionStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_tag()));
        }
        let json = serde_json::to_string(&BookingStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"awaiting_payment\"");
        let json = serde_json::to_string(&ApprovalStatus::None).unwrap();
        assert_eq!(json, "\"none\"");
    }

    #[test]
    fn terminal_states() {
        assert!(!SessionStatus::Upcoming.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Missed.is_terminal());

        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
    }
}
