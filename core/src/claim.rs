//! Claim protocol for "any staff" requests.
//!
//! A claim is a conditional write: it succeeds only if the booking is still
//! unassigned at the moment it is applied. The scheduler runs it under the
//! store's write lock, so of any number of concurrent claims exactly one
//! observes `staff_id == None`; the rest get [`Rejection::ClaimLost`].

use crate::error::Rejection;
use crate::types::{Booking, BookingStatus, StaffId, StaffMember};

/// Checks whether `staff` may claim `booking` right now.
///
/// # Errors
///
/// - [`Rejection::ClaimLost`] if the booking already has an owner (even the
///   same staff member: a repeated claim is a no-op, not a second assignment)
/// - [`Rejection::InvalidTransition`] if the booking is no longer waiting
/// - [`Rejection::StaffUnavailable`] / [`Rejection::NotPermitted`] if the
///   claimant is off duty or works elsewhere
pub fn check_claim(booking: &Booking, staff: &StaffMember) -> Result<(), Rejection> {
    if let Some(owner) = booking.staff_id {
        return Err(Rejection::ClaimLost {
            booking_id: booking.id,
            claimed_by: Some(owner),
        });
    }

    if !matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::Unverified
    ) {
        return Err(Rejection::InvalidTransition {
            status: booking.status,
            event: "claim",
        });
    }

    if staff.shop_id != booking.shop_id {
        return Err(Rejection::NotPermitted(format!(
            "staff {} does not work at shop {}",
            staff.id, booking.shop_id
        )));
    }

    if !staff.on_duty {
        return Err(Rejection::StaffUnavailable(staff.id));
    }

    Ok(())
}

/// Applies a checked claim. Callers must have run [`check_claim`] first.
pub fn assign(booking: &mut Booking, staff_id: StaffId) {
    booking.staff_id = Some(staff_id);
    booking.status = BookingStatus::Confirmed;
}
