//! The scheduler reducer.
//!
//! Every mutation of shops, staff and bookings goes through
//! [`SchedulerReducer::reduce`]. Each command is validated against the current
//! state first and only then applied, so a rejection never leaves a partial
//! write behind. Occupancy is recomputed after any booking change that could
//! affect it.

use crate::claim::{assign, check_claim};
use crate::effect::{Change, ChangeEvent, Effect, NotificationIntent, NotificationKind};
use crate::environment::{BookingPolicy, Clock};
use crate::error::Rejection;
use crate::expiry::{request_expired, walk_in_elapsed};
use crate::reducer::{Effects, Reducer, Reduction};
use crate::slots::{is_offerable, parse_clock};
use crate::state::SchedulerState;
use crate::transition::{next_status, Actor, BookingEvent, Role};
use crate::types::{
    Booking, BookingId, BookingKind, BookingStatus, ClientIdentity, ServiceItem, ServiceSnapshot,
    Shop, ShopId, StaffId, StaffMember, Version,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::collections::HashSet;
use std::sync::Arc;

// ============================================================================
// Actions
// ============================================================================

/// A client-facing booking request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Shop to book at
    pub shop_id: ShopId,
    /// Who the booking is for
    pub client: ClientIdentity,
    /// Name of a service on the shop's menu; snapshotted at creation
    pub service: String,
    /// Specific staff member, or `None` for "any available staff"
    pub staff_id: Option<StaffId>,
    /// Desired local start time; must be a currently offerable slot
    pub slot: NaiveDateTime,
}

/// Commands accepted by the scheduler
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerAction {
    /// Add a shop
    RegisterShop {
        /// Shop to add
        shop: Shop,
    },
    /// Manual open/closed toggle
    SetShopOpen {
        /// Shop
        shop_id: ShopId,
        /// New value
        is_open: bool,
    },
    /// Subscription activation hook
    SetShopActive {
        /// Shop
        shop_id: ShopId,
        /// New value
        is_active: bool,
    },
    /// Manual "booked out" marker
    SetBookedOut {
        /// Shop
        shop_id: ShopId,
        /// New value
        booked_out: bool,
    },
    /// Change opening hours
    UpdateHours {
        /// Shop
        shop_id: ShopId,
        /// Local opening time, `HH:MM`
        open_time: String,
        /// Local closing time, `HH:MM`
        close_time: String,
    },
    /// Replace the service menu
    UpdateMenu {
        /// Shop
        shop_id: ShopId,
        /// New menu
        menu: Vec<ServiceItem>,
    },
    /// Add a staff member
    InviteStaff {
        /// Staff member to add
        staff: StaffMember,
    },
    /// Remove a staff member (owner only)
    RemoveStaff {
        /// Shop the staff member belongs to
        shop_id: ShopId,
        /// Staff member to remove
        staff_id: StaffId,
    },
    /// Toggle duty (self or owner)
    SetOnDuty {
        /// Staff member
        staff_id: StaffId,
        /// New value
        on_duty: bool,
        /// Who is toggling
        actor: Actor,
    },
    /// Client books a slot
    CreateBooking(BookingRequest),
    /// Staff seats a client who walked in
    StartWalkIn {
        /// Shop
        shop_id: ShopId,
        /// Staff member taking the walk-in
        staff_id: StaffId,
        /// Service name from the menu
        service: String,
        /// Client details, if the staff member took them
        client: Option<ClientIdentity>,
    },
    /// Move a booking along its lifecycle
    ApplyTransition {
        /// Booking
        booking_id: BookingId,
        /// What happened
        event: BookingEvent,
        /// Who is asking
        actor: Actor,
        /// Version the caller observed, if it acted on a snapshot
        expected_version: Option<Version>,
    },
}

impl SchedulerAction {
    /// Stable name used in logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegisterShop { .. } => "register_shop",
            Self::SetShopOpen { .. } => "set_shop_open",
            Self::SetShopActive { .. } => "set_shop_active",
            Self::SetBookedOut { .. } => "set_booked_out",
            Self::UpdateHours { .. } => "update_hours",
            Self::UpdateMenu { .. } => "update_menu",
            Self::InviteStaff { .. } => "invite_staff",
            Self::RemoveStaff { .. } => "remove_staff",
            Self::SetOnDuty { .. } => "set_on_duty",
            Self::CreateBooking(_) => "create_booking",
            Self::StartWalkIn { .. } => "start_walk_in",
            Self::ApplyTransition { .. } => "apply_transition",
        }
    }
}

/// What a successful command returns
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Shop after the change
    Shop(Shop),
    /// Staff member after the change
    Staff(StaffMember),
    /// ID of the removed staff member
    StaffRemoved(StaffId),
    /// Booking after the change
    Booking(Booking),
}

impl Outcome {
    /// The booking, for booking commands
    #[must_use]
    pub const fn booking(&self) -> Option<&Booking> {
        match self {
            Self::Booking(booking) => Some(booking),
            _ => None,
        }
    }

    /// Consumes the outcome, returning the booking for booking commands
    #[must_use]
    pub fn into_booking(self) -> Option<Booking> {
        match self {
            Self::Booking(booking) => Some(booking),
            _ => None,
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies injected into the reducer
#[derive(Clone)]
pub struct SchedulerEnvironment {
    /// Clock for timestamps, slot checks and expiry
    pub clock: Arc<dyn Clock>,
    /// TTL and slot grid
    pub policy: BookingPolicy,
}

impl SchedulerEnvironment {
    /// Creates an environment with the default policy
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            policy: BookingPolicy::default(),
        }
    }

    /// Replaces the policy
    #[must_use]
    pub const fn with_policy(mut self, policy: BookingPolicy) -> Self {
        self.policy = policy;
        self
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for shops, staff and bookings
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulerReducer;

type Reduced = Result<Reduction<Outcome>, Rejection>;

impl SchedulerReducer {
    /// Creates a new `SchedulerReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn register_shop(state: &mut SchedulerState, mut shop: Shop) -> Reduced {
        if state.shops.contains_key(&shop.id) {
            return Err(Rejection::AlreadyExists(format!("shop {}", shop.id)));
        }
        if shop.name.trim().is_empty() {
            return Err(Rejection::Validation("shop name is required".to_string()));
        }
        Self::validate_menu(&shop.service_menu)?;

        let shop_id = shop.id;
        shop.occupancy = crate::types::OccupancyStatus::Available;
        state.shops.insert(shop_id, shop);
        state.refresh_occupancy(shop_id);

        let shop = state.shop(shop_id)?.clone();
        tracing::info!(shop_id = %shop_id, name = %shop.name, "shop registered");
        Ok(Reduction::new(
            Outcome::Shop(shop.clone()),
            smallvec![Effect::Publish(ChangeEvent::shop(&shop))],
        ))
    }

    /// Applies `update` to a shop, re-derives occupancy and publishes it.
    fn update_shop(
        state: &mut SchedulerState,
        shop_id: ShopId,
        update: impl FnOnce(&mut Shop),
    ) -> Reduced {
        let shop = state
            .shops
            .get_mut(&shop_id)
            .ok_or(Rejection::ShopNotFound(shop_id))?;
        update(shop);
        state.refresh_occupancy(shop_id);

        let shop = state.shop(shop_id)?.clone();
        Ok(Reduction::new(
            Outcome::Shop(shop.clone()),
            smallvec![Effect::Publish(ChangeEvent::shop(&shop))],
        ))
    }

    fn validate_hours(open_time: &str, close_time: &str) -> Result<(String, String), Rejection> {
        let (Some(open), Some(close)) = (parse_clock(open_time), parse_clock(close_time)) else {
            return Err(Rejection::Validation(format!(
                "unparsable opening hours {open_time:?} - {close_time:?}"
            )));
        };
        if open == close {
            return Err(Rejection::Validation(
                "opening and closing times must differ".to_string(),
            ));
        }
        Ok((
            open.format("%H:%M").to_string(),
            close.format("%H:%M").to_string(),
        ))
    }

    fn validate_menu(menu: &[ServiceItem]) -> Result<(), Rejection> {
        let mut names = HashSet::new();
        for item in menu {
            let name = item.name.trim();
            if name.is_empty() {
                return Err(Rejection::Validation("service name is required".to_string()));
            }
            if item.duration_minutes == 0 {
                return Err(Rejection::Validation(format!(
                    "service {name:?} must take at least one minute"
                )));
            }
            if !names.insert(name) {
                return Err(Rejection::Validation(format!(
                    "service {name:?} is listed twice"
                )));
            }
        }
        Ok(())
    }

    fn invite_staff(state: &mut SchedulerState, staff: StaffMember) -> Reduced {
        state.shop(staff.shop_id)?;
        if state.staff.contains_key(&staff.id) {
            return Err(Rejection::AlreadyExists(format!("staff member {}", staff.id)));
        }
        if staff.name.trim().is_empty() {
            return Err(Rejection::Validation("staff name is required".to_string()));
        }

        tracing::info!(staff_id = %staff.id, shop_id = %staff.shop_id, "staff invited");
        state.staff.insert(staff.id, staff.clone());
        Ok(Reduction::new(
            Outcome::Staff(staff.clone()),
            smallvec![Effect::Publish(ChangeEvent::staff(&staff))],
        ))
    }

    fn remove_staff(state: &mut SchedulerState, shop_id: ShopId, staff_id: StaffId) -> Reduced {
        state.shop(shop_id)?;
        state.shop_staff_member(shop_id, staff_id)?;
        state.staff.remove(&staff_id);

        tracing::info!(staff_id = %staff_id, shop_id = %shop_id, "staff removed");
        Ok(Reduction::new(
            Outcome::StaffRemoved(staff_id),
            smallvec![Effect::Publish(ChangeEvent {
                shop_id,
                change: Change::StaffRemoved(staff_id),
            })],
        ))
    }

    fn set_on_duty(
        state: &mut SchedulerState,
        staff_id: StaffId,
        on_duty: bool,
        actor: Actor,
    ) -> Reduced {
        state.staff_member(staff_id)?;
        match actor {
            Actor::Owner => {},
            Actor::Staff(id) if id == staff_id => {},
            other => {
                return Err(Rejection::NotPermitted(format!(
                    "{other} cannot change duty for staff {staff_id}"
                )));
            },
        }

        let staff = state
            .staff
            .get_mut(&staff_id)
            .ok_or(Rejection::StaffNotFound(staff_id))?;
        staff.on_duty = on_duty;
        let staff = staff.clone();
        Ok(Reduction::new(
            Outcome::Staff(staff.clone()),
            smallvec![Effect::Publish(ChangeEvent::staff(&staff))],
        ))
    }

    fn validate_client(client: &ClientIdentity) -> Result<(), Rejection> {
        if client.name.trim().is_empty() {
            return Err(Rejection::Validation("client name is required".to_string()));
        }
        let email = client.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(Rejection::Validation(format!(
                "invalid client email {email:?}"
            ))),
        }
    }

    fn menu_snapshot(shop: &Shop, service: &str) -> Result<ServiceSnapshot, Rejection> {
        shop.service(service)
            .map(ServiceItem::snapshot)
            .ok_or_else(|| Rejection::Validation(format!("unknown service {service:?}")))
    }

    fn create_booking(
        state: &mut SchedulerState,
        request: BookingRequest,
        env: &SchedulerEnvironment,
    ) -> Reduced {
        let shop = state.shop(request.shop_id)?;
        if !shop.is_active {
            return Err(Rejection::ShopInactive(shop.id));
        }
        if !shop.is_open {
            return Err(Rejection::ShopClosed(shop.id));
        }
        Self::validate_client(&request.client)?;
        let service = Self::menu_snapshot(shop, &request.service)?;

        if let Some(staff_id) = request.staff_id {
            let staff = state.shop_staff_member(shop.id, staff_id)?;
            if !staff.on_duty {
                return Err(Rejection::StaffUnavailable(staff_id));
            }
        }

        let now = env.clock.now();
        if !is_offerable(
            request.slot,
            shop.local_time(now),
            &shop.open_time,
            &shop.close_time,
            env.policy.slot_rules,
        ) {
            return Err(Rejection::SlotUnavailable);
        }

        let (status, kind) = if state.is_returning_client(shop.id, &request.client.email) {
            (BookingStatus::Pending, NotificationKind::RequestReceived)
        } else {
            (
                BookingStatus::Unverified,
                NotificationKind::VerificationRequested,
            )
        };

        let booking = Booking {
            id: BookingId::new(),
            shop_id: shop.id,
            staff_id: request.staff_id,
            client: request.client,
            service,
            kind: BookingKind::Appointment,
            scheduled_at: request.slot,
            proposed_time: None,
            status,
            created_at: now,
            updated_at: now,
            version: Version::new(1),
        };

        tracing::info!(
            booking_id = %booking.id,
            shop_id = %booking.shop_id,
            status = %booking.status,
            slot = %booking.scheduled_at,
            "booking requested"
        );

        state.bookings.insert(booking.id, booking.clone());
        Ok(Reduction::new(
            Outcome::Booking(booking.clone()),
            smallvec![
                Effect::Publish(ChangeEvent::booking(&booking)),
                Effect::Notify(NotificationIntent { kind, booking }),
            ],
        ))
    }

    fn start_walk_in(
        state: &mut SchedulerState,
        shop_id: ShopId,
        staff_id: StaffId,
        service: &str,
        client: Option<ClientIdentity>,
        env: &SchedulerEnvironment,
    ) -> Reduced {
        let shop = state.shop(shop_id)?;
        if !shop.is_active {
            return Err(Rejection::ShopInactive(shop_id));
        }
        let staff = state.shop_staff_member(shop_id, staff_id)?;
        if !staff.on_duty {
            return Err(Rejection::StaffUnavailable(staff_id));
        }
        let service = Self::menu_snapshot(shop, service)?;

        let now = env.clock.now();
        let starts_at = shop.local_time(now);
        let id = BookingId::new();
        let client = client.unwrap_or_else(|| ClientIdentity::walk_in(id));

        // Single chair: a second walk-in waits as confirmed until it is finished.
        let status = if state.occupying_walk_in(shop_id).is_some() {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Active
        };

        let booking = Booking {
            id,
            shop_id,
            staff_id: Some(staff_id),
            client,
            kind: BookingKind::WalkIn {
                ends_at: starts_at + service.duration(),
            },
            service,
            scheduled_at: starts_at,
            proposed_time: None,
            status,
            created_at: now,
            updated_at: now,
            version: Version::new(1),
        };

        tracing::info!(
            booking_id = %booking.id,
            shop_id = %shop_id,
            staff_id = %staff_id,
            window = %booking.time_label(),
            status = %booking.status,
            "walk-in started"
        );

        state.bookings.insert(id, booking.clone());
        let mut effects: Effects = smallvec![Effect::Publish(ChangeEvent::booking(&booking))];
        if let Some(shop) = state.refresh_occupancy(shop_id) {
            effects.push(Effect::Publish(ChangeEvent::shop(shop)));
        }
        Ok(Reduction::new(Outcome::Booking(booking), effects))
    }

    /// Walk-in and assignment rules layered on top of the transition table.
    fn check_kind(booking: &Booking, event: &BookingEvent) -> Result<(), Rejection> {
        let allowed = match event {
            BookingEvent::Expire | BookingEvent::ProposeReschedule { .. } => !booking.is_walk_in(),
            BookingEvent::AutoComplete => booking.is_walk_in(),
            // Unassigned requests are taken through the claim path.
            BookingEvent::Accept | BookingEvent::Decline => booking.staff_id.is_some(),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(Rejection::InvalidTransition {
                status: booking.status,
                event: event.name(),
            })
        }
    }

    fn authorize(
        state: &SchedulerState,
        booking: &Booking,
        event: &BookingEvent,
        actor: Actor,
    ) -> Result<(), Rejection> {
        let permitted = match (event.required_role(), actor) {
            (Role::Client, Actor::Client)
            | (Role::System, Actor::System)
            | (Role::AssignedStaffOrOwner, Actor::Owner) => true,
            (Role::AssignedStaffOrOwner, Actor::Staff(id)) => booking.staff_id == Some(id),
            (Role::OnDutyStaff, Actor::Staff(id)) => {
                let staff = state.staff_member(id)?;
                check_claim(booking, staff)?;
                true
            },
            _ => false,
        };
        if permitted {
            Ok(())
        } else {
            Err(Rejection::NotPermitted(format!(
                "{actor} cannot {event} booking {}",
                booking.id
            )))
        }
    }

    fn check_timing(
        booking: &Booking,
        shop: &Shop,
        event: &BookingEvent,
        now: DateTime<Utc>,
        policy: &BookingPolicy,
    ) -> Result<(), Rejection> {
        match event {
            BookingEvent::Expire if !request_expired(booking, now, policy.request_ttl) => Err(
                Rejection::Validation(format!("booking {} has not expired yet", booking.id)),
            ),
            BookingEvent::AutoComplete if !walk_in_elapsed(booking, shop, now) => Err(
                Rejection::Validation(format!("walk-in {} is still in progress", booking.id)),
            ),
            BookingEvent::ProposeReschedule { proposed_at }
                if *proposed_at <= shop.local_time(now) || *proposed_at == booking.scheduled_at =>
            {
                Err(Rejection::Validation(
                    "proposed time must be a new time in the future".to_string(),
                ))
            },
            _ => Ok(()),
        }
    }

    /// Notification emitted by a committed transition, if any
    const fn notification_for(event: &BookingEvent) -> Option<NotificationKind> {
        match event {
            BookingEvent::Accept | BookingEvent::Claim | BookingEvent::AcceptReschedule => {
                Some(NotificationKind::Confirmed)
            },
            BookingEvent::Decline | BookingEvent::DeclineReschedule | BookingEvent::Expire => {
                Some(NotificationKind::Cancelled)
            },
            BookingEvent::ProposeReschedule { .. } => Some(NotificationKind::RescheduleOffered),
            BookingEvent::VerifyEmail
            | BookingEvent::Finish
            | BookingEvent::Cancel { .. }
            | BookingEvent::AutoComplete => None,
        }
    }

    /// Validates a transition and returns the status it leads to.
    fn validate_transition(
        state: &SchedulerState,
        booking: &Booking,
        event: &BookingEvent,
        actor: Actor,
        expected_version: Option<Version>,
        env: &SchedulerEnvironment,
    ) -> Result<BookingStatus, Rejection> {
        // A claim that arrives after another one landed lost the race,
        // whatever version the caller saw.
        if let (BookingEvent::Claim, Some(owner)) = (event, booking.staff_id) {
            return Err(Rejection::ClaimLost {
                booking_id: booking.id,
                claimed_by: Some(owner),
            });
        }

        if let Some(expected) = expected_version.filter(|v| *v != booking.version) {
            return Err(Rejection::StaleState {
                expected,
                actual: booking.version,
            });
        }

        let next = next_status(booking.status, event).ok_or(Rejection::InvalidTransition {
            status: booking.status,
            event: event.name(),
        })?;
        Self::check_kind(booking, event)?;
        Self::authorize(state, booking, event, actor)?;

        let shop = state.shop(booking.shop_id)?;
        Self::check_timing(booking, shop, event, env.clock.now(), &env.policy)?;
        Ok(next)
    }

    fn apply_transition(
        state: &mut SchedulerState,
        booking_id: BookingId,
        event: BookingEvent,
        actor: Actor,
        expected_version: Option<Version>,
        env: &SchedulerEnvironment,
    ) -> Reduced {
        let current = state.booking(booking_id)?;
        let from = current.status;
        let next = Self::validate_transition(state, current, &event, actor, expected_version, env)?;

        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(Rejection::BookingNotFound(booking_id))?;
        match (event, actor) {
            (BookingEvent::Claim, Actor::Staff(staff_id)) => assign(booking, staff_id),
            (BookingEvent::ProposeReschedule { proposed_at }, _) => {
                booking.proposed_time = Some(proposed_at);
            },
            (BookingEvent::AcceptReschedule, _) => {
                if let Some(proposed_at) = booking.proposed_time {
                    booking.scheduled_at = proposed_at;
                }
            },
            _ => {},
        }
        booking.status = next;
        if next != BookingStatus::RescheduleProposed {
            booking.proposed_time = None;
        }
        booking.updated_at = env.clock.now();
        booking.version = booking.version.next();
        let booking = booking.clone();

        tracing::info!(
            booking_id = %booking_id,
            event = %event,
            actor = %actor,
            from = %from,
            to = %next,
            version = %booking.version,
            "booking transitioned"
        );

        let mut effects: Effects = smallvec![Effect::Publish(ChangeEvent::booking(&booking))];
        if booking.is_walk_in() {
            if let Some(shop) = state.refresh_occupancy(booking.shop_id) {
                effects.push(Effect::Publish(ChangeEvent::shop(shop)));
            }
        }
        if let Some(kind) = Self::notification_for(&event) {
            effects.push(Effect::Notify(NotificationIntent {
                kind,
                booking: booking.clone(),
            }));
        }
        Ok(Reduction::new(Outcome::Booking(booking), effects))
    }
}

impl Reducer for SchedulerReducer {
    type State = SchedulerState;
    type Action = SchedulerAction;
    type Environment = SchedulerEnvironment;
    type Output = Outcome;
    type Error = Rejection;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Reduced {
        match action {
            SchedulerAction::RegisterShop { shop } => Self::register_shop(state, shop),
            SchedulerAction::SetShopOpen { shop_id, is_open } => {
                Self::update_shop(state, shop_id, |shop| shop.is_open = is_open)
            },
            SchedulerAction::SetShopActive { shop_id, is_active } => {
                Self::update_shop(state, shop_id, |shop| shop.is_active = is_active)
            },
            SchedulerAction::SetBookedOut {
                shop_id,
                booked_out,
            } => Self::update_shop(state, shop_id, |shop| shop.booked_out = booked_out),
            SchedulerAction::UpdateHours {
                shop_id,
                open_time,
                close_time,
            } => {
                state.shop(shop_id)?;
                let (open_time, close_time) = Self::validate_hours(&open_time, &close_time)?;
                Self::update_shop(state, shop_id, |shop| {
                    shop.open_time = open_time;
                    shop.close_time = close_time;
                })
            },
            SchedulerAction::UpdateMenu { shop_id, menu } => {
                state.shop(shop_id)?;
                if menu.is_empty() {
                    return Err(Rejection::Validation(
                        "menu needs at least one service".to_string(),
                    ));
                }
                Self::validate_menu(&menu)?;
                Self::update_shop(state, shop_id, |shop| shop.service_menu = menu)
            },
            SchedulerAction::InviteStaff { staff } => Self::invite_staff(state, staff),
            SchedulerAction::RemoveStaff { shop_id, staff_id } => {
                Self::remove_staff(state, shop_id, staff_id)
            },
            SchedulerAction::SetOnDuty {
                staff_id,
                on_duty,
                actor,
            } => Self::set_on_duty(state, staff_id, on_duty, actor),
            SchedulerAction::CreateBooking(request) => Self::create_booking(state, request, env),
            SchedulerAction::StartWalkIn {
                shop_id,
                staff_id,
                service,
                client,
            } => Self::start_walk_in(state, shop_id, staff_id, &service, client, env),
            SchedulerAction::ApplyTransition {
                booking_id,
                event,
                actor,
                expected_version,
            } => Self::apply_transition(state, booking_id, event, actor, expected_version, env),
        }
    }
}

/// Offerable slots for a shop, recomputed from the clock on every call.
///
/// # Errors
///
/// Returns [`Rejection::ShopNotFound`] if there is no such shop.
pub fn query_slots(
    state: &SchedulerState,
    shop_id: ShopId,
    env: &SchedulerEnvironment,
) -> Result<Vec<NaiveDateTime>, Rejection> {
    state.slots(shop_id, env.clock.now(), env.policy.slot_rules)
}
