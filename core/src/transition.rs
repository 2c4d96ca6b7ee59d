//! Booking status transition table.
//!
//! Every legal `(status, event)` pair is listed in [`next_status`]; anything
//! else is rejected. Terminal statuses have no outgoing edges.

use crate::types::{BookingStatus, StaffId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a booking was cancelled by staff
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Staff or owner cancelled from the dashboard
    Manual,
    /// Client never showed up
    NoShow,
}

/// Something that happens to a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    /// Client consumed the verification link
    VerifyEmail,
    /// Assigned staff accepts the request
    Accept,
    /// Assigned staff declines the request
    Decline,
    /// An on-duty staff member takes an unassigned request
    Claim,
    /// Staff offers a different time
    ProposeReschedule {
        /// Offered local start time
        proposed_at: NaiveDateTime,
    },
    /// Client takes the offered time
    AcceptReschedule,
    /// Client turns the offered time down
    DeclineReschedule,
    /// Service delivered
    Finish,
    /// Manual cancel or no-show
    Cancel {
        /// Why
        reason: CancelReason,
    },
    /// Request left unanswered past its time-to-live
    Expire,
    /// Walk-in window elapsed
    AutoComplete,
}

impl BookingEvent {
    /// Stable name used in logs, metrics and rejections
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Claim => "claim",
            Self::ProposeReschedule { .. } => "propose_reschedule",
            Self::AcceptReschedule => "accept_reschedule",
            Self::DeclineReschedule => "decline_reschedule",
            Self::Finish => "finish",
            Self::Cancel { .. } => "cancel",
            Self::Expire => "expire",
            Self::AutoComplete => "auto_complete",
        }
    }

    /// Who may trigger this event
    #[must_use]
    pub const fn required_role(&self) -> Role {
        match self {
            Self::VerifyEmail | Self::AcceptReschedule | Self::DeclineReschedule => Role::Client,
            Self::Claim => Role::OnDutyStaff,
            Self::Accept
            | Self::Decline
            | Self::ProposeReschedule { .. }
            | Self::Finish
            | Self::Cancel { .. } => Role::AssignedStaffOrOwner,
            Self::Expire | Self::AutoComplete => Role::System,
        }
    }
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who is asking for a change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// The client the booking belongs to (link holder)
    Client,
    /// A staff member acting from their dashboard
    Staff(StaffId),
    /// The shop owner
    Owner,
    /// The expiry sweeper
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Staff(id) => write!(f, "staff:{id}"),
            Self::Owner => f.write_str("owner"),
            Self::System => f.write_str("system"),
        }
    }
}

/// Permission class an event requires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The client
    Client,
    /// Any on-duty staff member of the shop
    OnDutyStaff,
    /// The staff member assigned to the booking, or the owner
    AssignedStaffOrOwner,
    /// Background sweeper only
    System,
}

/// Status reached by applying `event` in `status`, or `None` if the pair is not
/// an edge of the lifecycle graph.
///
/// This is purely structural; the scheduler layers on the walk-in, claim and
/// permission checks.
#[must_use]
pub const fn next_status(status: BookingStatus, event: &BookingEvent) -> Option<BookingStatus> {
    use BookingEvent as E;
    use BookingStatus as S;

    match (status, event) {
        (S::Unverified, E::VerifyEmail) => Some(S::Pending),
        (S::Unverified | S::Pending, E::Expire) => Some(S::Cancelled),
        (S::Unverified | S::Pending, E::Claim) => Some(S::Confirmed),
        (S::Pending, E::Accept) => Some(S::Confirmed),
        (S::Pending, E::Decline) => Some(S::Declined),
        (S::Confirmed, E::ProposeReschedule { .. }) => Some(S::RescheduleProposed),
        (S::RescheduleProposed, E::AcceptReschedule) => Some(S::Confirmed),
        (S::RescheduleProposed, E::DeclineReschedule) => Some(S::Cancelled),
        (S::Confirmed | S::Active, E::Finish | E::AutoComplete) => Some(S::Completed),
        (S::Confirmed | S::Pending | S::Active, E::Cancel { .. }) => Some(S::Cancelled),
        _ => None,
    }
}
