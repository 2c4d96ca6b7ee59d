//! Domain types for shops, staff and bookings.
//!
//! Bookings keep a snapshot of the service they were made for, so later menu
//! edits never rewrite history. Times a client sees (slots, walk-in windows)
//! are shop-local wall-clock values; audit timestamps are UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
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
    };
}

uuid_id!(
    /// Unique identifier for a shop
    ShopId
);
uuid_id!(
    /// Unique identifier for a staff member
    StaffId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);

/// Per-booking revision counter, bumped on every committed change.
///
/// Callers that acted on a cached snapshot pass the version they saw; a
/// mismatch means someone else got there first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Creates a version with the given value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the following version
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ============================================================================
// Value objects
// ============================================================================

/// Money in minor units (pence)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates money from minor units
    #[must_use]
    pub const fn from_pence(pence: u64) -> Self {
        Self(pence)
    }

    /// Creates money from whole pounds
    #[must_use]
    pub const fn from_pounds(pounds: u64) -> Self {
        Self(pounds * 100)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn pence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "£{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// One entry on a shop's service menu
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceItem {
    /// Display name ("Skin Fade")
    pub name: String,
    /// How long the service takes
    pub duration_minutes: u32,
    /// Price charged
    pub price: Money,
}

impl ServiceItem {
    /// Creates a menu entry
    #[must_use]
    pub fn new(name: impl Into<String>, duration_minutes: u32, price: Money) -> Self {
        Self {
            name: name.into(),
            duration_minutes,
            price,
        }
    }

    /// Copies this entry into a booking-owned snapshot
    #[must_use]
    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            name: self.name.clone(),
            duration_minutes: self.duration_minutes,
            price: self.price,
        }
    }
}

/// Service details frozen into a booking at creation time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// Service name at booking time
    pub name: String,
    /// Duration at booking time
    pub duration_minutes: u32,
    /// Price at booking time
    pub price: Money,
}

impl ServiceSnapshot {
    /// Service duration as a `chrono::Duration`
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Who the booking is for. The email doubles as the verification key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Client name
    pub name: String,
    /// Client email (verification key, matched case-insensitively)
    pub email: String,
    /// Client phone
    pub phone: String,
}

impl ClientIdentity {
    /// Creates a client identity
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Placeholder identity for a client who walked in off the street
    #[must_use]
    pub fn walk_in(booking_id: BookingId) -> Self {
        Self {
            name: "Walk-in".to_string(),
            email: format!("walkin-{booking_id}@walk-in.local"),
            phone: "Walk-in".to_string(),
        }
    }

    /// Returns true when both identities share an email address
    #[must_use]
    pub fn same_email(&self, other: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(other.trim())
    }
}

// ============================================================================
// Shop & staff
// ============================================================================

/// Shop-level occupancy flag shown to clients
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStatus {
    /// Chair free
    #[default]
    Available,
    /// A walk-in is being serviced right now
    WithClient,
    /// Staff marked the shop as fully booked
    BookedOut,
}

/// A service provider with one or more staff
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Shop ID
    pub id: ShopId,
    /// Display name
    pub name: String,
    /// Opening time, local `HH:MM`
    pub open_time: String,
    /// Closing time, local `HH:MM`; earlier than `open_time` means overnight
    pub close_time: String,
    /// Offset of the shop's wall clock from UTC
    pub utc_offset_minutes: i32,
    /// Manual open/closed toggle, independent of hours
    pub is_open: bool,
    /// Subscription flag; inactive shops take no new bookings
    pub is_active: bool,
    /// Current occupancy, derived from active walk-ins plus the booked-out flag
    pub occupancy: OccupancyStatus,
    /// Manual "booked out" marker set from the dashboard
    pub booked_out: bool,
    /// Ordered service menu
    pub service_menu: Vec<ServiceItem>,
}

impl Shop {
    /// Creates an open, active shop on UTC with default hours
    #[must_use]
    pub fn new(id: ShopId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            open_time: "09:00".to_string(),
            close_time: "19:00".to_string(),
            utc_offset_minutes: 0,
            is_open: true,
            is_active: true,
            occupancy: OccupancyStatus::Available,
            booked_out: false,
            service_menu: Vec::new(),
        }
    }

    /// Sets opening hours
    #[must_use]
    pub fn with_hours(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open_time = open.into();
        self.close_time = close.into();
        self
    }

    /// Sets the UTC offset of the shop's wall clock
    #[must_use]
    pub const fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Sets the service menu
    #[must_use]
    pub fn with_menu(mut self, menu: Vec<ServiceItem>) -> Self {
        self.service_menu = menu;
        self
    }

    /// Converts an instant into the shop's local wall-clock time
    #[must_use]
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.naive_utc() + Duration::minutes(i64::from(self.utc_offset_minutes))
    }

    /// Finds a menu entry by name
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceItem> {
        self.service_menu.iter().find(|s| s.name == name)
    }
}

/// A member of staff belonging to exactly one shop
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    /// Staff ID
    pub id: StaffId,
    /// Owning shop
    pub shop_id: ShopId,
    /// Display name
    pub name: String,
    /// Visible for booking only while on duty
    pub on_duty: bool,
    /// Optional link to an authenticated identity
    pub identity: Option<String>,
}

impl StaffMember {
    /// Creates an off-duty staff member
    #[must_use]
    pub fn new(id: StaffId, shop_id: ShopId, name: impl Into<String>) -> Self {
        Self {
            id,
            shop_id,
            name: name.into(),
            on_duty: false,
            identity: None,
        }
    }

    /// Marks the staff member on duty
    #[must_use]
    pub const fn on_duty(mut self) -> Self {
        self.on_duty = true;
        self
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking status. The set is closed; unknown strings are rejected on parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Waiting for the client to click the verification link
    Unverified,
    /// Verified, waiting for staff to accept or decline
    Pending,
    /// Accepted by staff
    Confirmed,
    /// Staff offered a new time, waiting for the client
    RescheduleProposed,
    /// Walk-in currently in the chair
    Active,
    /// Service delivered
    Completed,
    /// Cancelled by someone or by expiry
    Cancelled,
    /// Declined by staff
    Declined,
}

impl BookingStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 8] = [
        Self::Unverified,
        Self::Pending,
        Self::Confirmed,
        Self::RescheduleProposed,
        Self::Active,
        Self::Completed,
        Self::Cancelled,
        Self::Declined,
    ];

    /// Terminal statuses never change again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Declined)
    }

    /// Statuses that count as an established relationship with the shop
    #[must_use]
    pub const fn counts_as_history(self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed)
    }

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::RescheduleProposed => "reschedule_proposed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a status string is not one of the known statuses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Whether a booking was made ahead of time or started on the spot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingKind {
    /// Booked for a slot
    Appointment,
    /// Started immediately by staff; occupies the chair until `ends_at`
    WalkIn {
        /// Local time the service window ends
        ends_at: NaiveDateTime,
    },
}

/// The central entity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID
    pub id: BookingId,
    /// Owning shop
    pub shop_id: ShopId,
    /// Assigned staff; `None` means "any available staff" and is claimable
    pub staff_id: Option<StaffId>,
    /// Who the booking is for
    pub client: ClientIdentity,
    /// Service snapshot taken at creation
    pub service: ServiceSnapshot,
    /// Appointment or walk-in
    pub kind: BookingKind,
    /// Local start time
    pub scheduled_at: NaiveDateTime,
    /// Time offered by staff during reschedule negotiation
    pub proposed_time: Option<NaiveDateTime>,
    /// Current status
    pub status: BookingStatus,
    /// When the booking was created (drives request expiry)
    pub created_at: DateTime<Utc>,
    /// When the booking last changed
    pub updated_at: DateTime<Utc>,
    /// Revision counter
    pub version: Version,
}

impl Booking {
    /// Returns true for walk-ins
    #[must_use]
    pub const fn is_walk_in(&self) -> bool {
        matches!(self.kind, BookingKind::WalkIn { .. })
    }

    /// Local end of the walk-in window, if this is a walk-in
    #[must_use]
    pub const fn walk_in_ends_at(&self) -> Option<NaiveDateTime> {
        match self.kind {
            BookingKind::WalkIn { ends_at } => Some(ends_at),
            BookingKind::Appointment => None,
        }
    }

    /// Returns true while this booking holds the shop's chair
    #[must_use]
    pub const fn is_occupying(&self) -> bool {
        self.is_walk_in() && matches!(self.status, BookingStatus::Active)
    }

    /// Returns true while nobody has taken ownership of the request
    #[must_use]
    pub const fn is_claimable(&self) -> bool {
        self.staff_id.is_none()
            && matches!(self.status, BookingStatus::Pending | BookingStatus::Unverified)
    }

    /// Local calendar date of the booking
    #[must_use]
    pub fn scheduled_date(&self) -> NaiveDate {
        self.scheduled_at.date()
    }

    /// `HH:MM` for appointments, `HH:MM - HH:MM` for walk-ins
    #[must_use]
    pub fn time_label(&self) -> String {
        let start = self.scheduled_at.format("%H:%M");
        match self.kind {
            BookingKind::WalkIn { ends_at } => format!("{start} - {}", ends_at.format("%H:%M")),
            BookingKind::Appointment => start.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("rescheduled".parse::<BookingStatus>().is_err());
        assert!("CONFIRMED".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&BookingStatus::RescheduleProposed).unwrap();
        assert_eq!(json, "\"reschedule_proposed\"");
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = BookingStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                BookingStatus::Completed,
                BookingStatus::Cancelled,
                BookingStatus::Declined
            ]
        );
    }

    #[test]
    fn walk_in_time_label_is_a_range() {
        let shop_id = ShopId::new();
        let id = BookingId::new();
        let booking = Booking {
            id,
            shop_id,
            staff_id: None,
            client: ClientIdentity::walk_in(id),
            service: ServiceItem::new("Beard Trim", 20, Money::from_pounds(10)).snapshot(),
            kind: BookingKind::WalkIn { ends_at: at(14, 20) },
            scheduled_at: at(14, 0),
            proposed_time: None,
            status: BookingStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: Version::default(),
        };
        assert_eq!(booking.time_label(), "14:00 - 14:20");
        assert!(booking.is_occupying());
    }

    #[test]
    fn emails_match_case_insensitively() {
        let client = ClientIdentity::new("Sam", "Sam@Example.com", "07000");
        assert!(client.same_email(" sam@example.com"));
        assert!(!client.same_email("sam@example.org"));
    }

    #[test]
    fn local_time_applies_offset() {
        let shop = Shop::new(ShopId::new(), "Fades").with_utc_offset_minutes(60);
        let now = at(10, 0).and_utc();
        assert_eq!(shop.local_time(now), at(11, 0));
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_pence(2050).to_string(), "£20.50");
    }
}
