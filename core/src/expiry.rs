//! Selection of bookings the expiry sweeper must close.
//!
//! Selection is read-only. Each due booking is returned with the version it
//! was observed at; the sweeper applies them one by one with that version as
//! a precondition, so a human action that lands between selection and apply
//! simply wins.

use crate::state::SchedulerState;
use crate::transition::BookingEvent;
use crate::types::{Booking, BookingId, BookingStatus, Shop, Version};
use chrono::{DateTime, Duration, Utc};

/// One transition the sweeper should attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueTransition {
    /// Booking to transition
    pub booking_id: BookingId,
    /// `Expire` or `AutoComplete`
    pub event: BookingEvent,
    /// Version observed at selection time
    pub expected_version: Version,
}

/// True when a request has waited longer than `ttl` without an answer.
#[must_use]
pub fn request_expired(booking: &Booking, now: DateTime<Utc>, ttl: Duration) -> bool {
    !booking.is_walk_in()
        && matches!(
            booking.status,
            BookingStatus::Pending | BookingStatus::Unverified
        )
        && now - booking.created_at > ttl
}

/// True when a walk-in's window has elapsed on the shop's clock.
#[must_use]
pub fn walk_in_elapsed(booking: &Booking, shop: &Shop, now: DateTime<Utc>) -> bool {
    matches!(
        booking.status,
        BookingStatus::Active | BookingStatus::Confirmed
    ) && booking
        .walk_in_ends_at()
        .is_some_and(|ends_at| ends_at <= shop.local_time(now))
}

/// Every booking that is due for expiry or auto-completion at `now`,
/// ordered oldest first so repeated sweeps are deterministic.
#[must_use]
pub fn due_transitions(
    state: &SchedulerState,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Vec<DueTransition> {
    let mut due: Vec<_> = state
        .bookings
        .values()
        .filter_map(|booking| {
            let event = if request_expired(booking, now, ttl) {
                BookingEvent::Expire
            } else if state
                .shops
                .get(&booking.shop_id)
                .is_some_and(|shop| walk_in_elapsed(booking, shop, now))
            {
                BookingEvent::AutoComplete
            } else {
                return None;
            };
            Some((booking.created_at, DueTransition {
                booking_id: booking.id,
                event,
                expected_version: booking.version,
            }))
        })
        .collect();
    due.sort_by_key(|(created_at, t)| (*created_at, t.booking_id));
    due.into_iter().map(|(_, t)| t).collect()
}
