//! Scheduler state and read-side queries.
//!
//! Shop occupancy is never set directly. It is recomputed from the booking
//! set after every mutation that could affect it, so the flag cannot drift
//! from the bookings it summarizes.

use crate::error::Rejection;
use crate::slots::{generate_slots, SlotRules};
use crate::types::{Booking, BookingId, OccupancyStatus, Shop, ShopId, StaffId, StaffMember};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;

/// Everything the scheduler knows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// Shops by ID
    pub shops: HashMap<ShopId, Shop>,
    /// Staff by ID
    pub staff: HashMap<StaffId, StaffMember>,
    /// Bookings by ID, including terminal ones
    pub bookings: HashMap<BookingId, Booking>,
}

impl SchedulerState {
    /// Looks up a shop
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::ShopNotFound`] if there is no such shop.
    pub fn shop(&self, shop_id: ShopId) -> Result<&Shop, Rejection> {
        self.shops
            .get(&shop_id)
            .ok_or(Rejection::ShopNotFound(shop_id))
    }

    /// Looks up a staff member
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::StaffNotFound`] if there is no such staff member.
    pub fn staff_member(&self, staff_id: StaffId) -> Result<&StaffMember, Rejection> {
        self.staff
            .get(&staff_id)
            .ok_or(Rejection::StaffNotFound(staff_id))
    }

    /// Looks up a staff member and checks they work at `shop_id`
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::StaffNotFound`] if missing or employed elsewhere.
    pub fn shop_staff_member(
        &self,
        shop_id: ShopId,
        staff_id: StaffId,
    ) -> Result<&StaffMember, Rejection> {
        self.staff
            .get(&staff_id)
            .filter(|s| s.shop_id == shop_id)
            .ok_or(Rejection::StaffNotFound(staff_id))
    }

    /// Looks up a booking
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::BookingNotFound`] if there is no such booking.
    pub fn booking(&self, booking_id: BookingId) -> Result<&Booking, Rejection> {
        self.bookings
            .get(&booking_id)
            .ok_or(Rejection::BookingNotFound(booking_id))
    }

    /// All bookings of a shop ordered by start time
    #[must_use]
    pub fn shop_bookings(&self, shop_id: ShopId) -> Vec<&Booking> {
        let mut bookings: Vec<_> = self
            .bookings
            .values()
            .filter(|b| b.shop_id == shop_id)
            .collect();
        bookings.sort_by_key(|b| (b.scheduled_at, b.created_at));
        bookings
    }

    /// The broadcast queue: unassigned requests any on-duty staff may claim,
    /// oldest first
    #[must_use]
    pub fn claimable(&self, shop_id: ShopId) -> Vec<&Booking> {
        let mut bookings: Vec<_> = self
            .bookings
            .values()
            .filter(|b| b.shop_id == shop_id && b.is_claimable())
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        bookings
    }

    /// Open (non-terminal) bookings assigned to a staff member, by start time
    #[must_use]
    pub fn staff_schedule(&self, staff_id: StaffId) -> Vec<&Booking> {
        let mut bookings: Vec<_> = self
            .bookings
            .values()
            .filter(|b| b.staff_id == Some(staff_id) && !b.status.is_terminal())
            .collect();
        bookings.sort_by_key(|b| b.scheduled_at);
        bookings
    }

    /// On-duty staff of a shop
    #[must_use]
    pub fn on_duty_staff(&self, shop_id: ShopId) -> Vec<&StaffMember> {
        self.staff
            .values()
            .filter(|s| s.shop_id == shop_id && s.on_duty)
            .collect()
    }

    /// True when `email` has at least one confirmed or completed booking at
    /// the shop
    #[must_use]
    pub fn is_returning_client(&self, shop_id: ShopId, email: &str) -> bool {
        self.bookings.values().any(|b| {
            b.shop_id == shop_id && b.status.counts_as_history() && b.client.same_email(email)
        })
    }

    /// The walk-in currently holding the chair, if any
    #[must_use]
    pub fn occupying_walk_in(&self, shop_id: ShopId) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.shop_id == shop_id && b.is_occupying())
    }

    /// Occupancy derived from the booking set and the booked-out flag
    #[must_use]
    pub fn derived_occupancy(&self, shop_id: ShopId) -> OccupancyStatus {
        if self.occupying_walk_in(shop_id).is_some() {
            return OccupancyStatus::WithClient;
        }
        match self.shops.get(&shop_id) {
            Some(shop) if shop.booked_out => OccupancyStatus::BookedOut,
            _ => OccupancyStatus::Available,
        }
    }

    /// Recomputes a shop's occupancy. Returns the updated shop when the flag
    /// actually changed.
    pub fn refresh_occupancy(&mut self, shop_id: ShopId) -> Option<&Shop> {
        let occupancy = self.derived_occupancy(shop_id);
        let shop = self.shops.get_mut(&shop_id)?;
        if shop.occupancy == occupancy {
            return None;
        }
        shop.occupancy = occupancy;
        Some(&*shop)
    }

    /// Offerable slots for a shop at `now`.
    ///
    /// Closed and inactive shops offer nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::ShopNotFound`] if there is no such shop.
    pub fn slots(
        &self,
        shop_id: ShopId,
        now: DateTime<Utc>,
        rules: SlotRules,
    ) -> Result<Vec<NaiveDateTime>, Rejection> {
        let shop = self.shop(shop_id)?;
        if !shop.is_open || !shop.is_active {
            return Ok(Vec::new());
        }
        Ok(generate_slots(
            shop.local_time(now),
            &shop.open_time,
            &shop.close_time,
            rules,
        ))
    }
}
