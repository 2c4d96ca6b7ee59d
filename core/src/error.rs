//! Rejections returned by the scheduler.
//!
//! A rejection always means nothing was mutated. Most of them are ordinary
//! business outcomes under concurrency rather than faults.

use crate::types::{BookingId, BookingStatus, ShopId, StaffId, Version};
use thiserror::Error;

/// Why a command was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No shop with this ID
    #[error("shop {0} not found")]
    ShopNotFound(ShopId),

    /// No staff member with this ID (or not in this shop)
    #[error("staff member {0} not found")]
    StaffNotFound(StaffId),

    /// No booking with this ID
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    /// An entity with this ID already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The event is not defined for the booking's current status
    #[error("cannot {event} a booking that is {status}")]
    InvalidTransition {
        /// Status the booking is actually in
        status: BookingStatus,
        /// Event that was attempted
        event: &'static str,
    },

    /// The caller acted on an out-of-date snapshot
    #[error("stale booking state: expected {expected}, found {actual}")]
    StaleState {
        /// Version the caller saw
        expected: Version,
        /// Version the booking is at now
        actual: Version,
    },

    /// Another staff member claimed the request first
    #[error("booking {booking_id} was already claimed")]
    ClaimLost {
        /// Booking that was contested
        booking_id: BookingId,
        /// Current owner, if any
        claimed_by: Option<StaffId>,
    },

    /// The actor may not perform this action
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// The shop's subscription is inactive
    #[error("shop {0} is not accepting new bookings")]
    ShopInactive(ShopId),

    /// The shop is manually closed
    #[error("shop {0} is closed")]
    ShopClosed(ShopId),

    /// The requested start time is not currently offerable
    #[error("requested slot is not available")]
    SlotUnavailable,

    /// The requested staff member is off duty
    #[error("staff member {0} is not on duty")]
    StaffUnavailable(StaffId),

    /// Input failed validation
    #[error("validation failed: {0}")]
    Validation(String),
}

impl Rejection {
    /// True when the caller's view is out of date and it should re-sync from
    /// the change feed before trying again.
    #[must_use]
    pub const fn should_refresh(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::StaleState { .. }
                | Self::ClaimLost { .. }
                | Self::BookingNotFound(_)
        )
    }

    /// Short label for metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ShopNotFound(_) => "shop_not_found",
            Self::StaffNotFound(_) => "staff_not_found",
            Self::BookingNotFound(_) => "booking_not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::StaleState { .. } => "stale_state",
            Self::ClaimLost { .. } => "claim_lost",
            Self::NotPermitted(_) => "not_permitted",
            Self::ShopInactive(_) => "shop_inactive",
            Self::ShopClosed(_) => "shop_closed",
            Self::SlotUnavailable => "slot_unavailable",
            Self::StaffUnavailable(_) => "staff_unavailable",
            Self::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn races_ask_for_refresh() {
        let lost = Rejection::ClaimLost {
            booking_id: BookingId::new(),
            claimed_by: Some(StaffId::new()),
        };
        assert!(lost.should_refresh());
        assert!(!Rejection::SlotUnavailable.should_refresh());
    }

    #[test]
    fn invalid_transition_message_names_both_sides() {
        let rejection = Rejection::InvalidTransition {
            status: BookingStatus::Pending,
            event: "verify_email",
        };
        assert_eq!(
            rejection.to_string(),
            "cannot verify_email a booking that is pending"
        );
    }
}
