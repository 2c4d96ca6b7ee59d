//! # Chairbook Core
//!
//! Scheduling and booking-lifecycle core for walk-in and online appointments.
//!
//! Everything here is pure and synchronous: the runtime crate owns locking,
//! effect execution and timers.
//!
//! ## Core Concepts
//!
//! - **Slots**: offerable start times, a pure function of clock and hours
//!   ([`slots`])
//! - **Lifecycle**: the closed status set and its transition table
//!   ([`transition`])
//! - **Claim**: compare-and-swap assignment of "any staff" requests ([`claim`])
//! - **Expiry**: selection of requests and walk-ins the sweeper must close
//!   ([`expiry`])
//! - **Reducer**: the single writer of truth, `(State, Action, Env) → Result<(Output, Effects)>`
//!   ([`scheduler`])
//! - **Effect**: descriptions of notifications and change-feed publications,
//!   executed by the runtime
//!
//! ## Example
//!
//! ```
//! use chairbook_core::reducer::Reducer;
//! use chairbook_core::scheduler::{SchedulerAction, SchedulerEnvironment, SchedulerReducer};
//! use chairbook_core::state::SchedulerState;
//! use chairbook_core::types::{Money, ServiceItem, Shop, ShopId};
//! use chairbook_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! let env = SchedulerEnvironment::new(Arc::new(SystemClock));
//! let mut state = SchedulerState::default();
//! let shop = Shop::new(ShopId::new(), "Fades & Co")
//!     .with_menu(vec![ServiceItem::new("Skin Fade", 45, Money::from_pounds(20))]);
//!
//! let reduction = SchedulerReducer
//!     .reduce(&mut state, SchedulerAction::RegisterShop { shop }, &env)
//!     .unwrap();
//! assert_eq!(reduction.effects.len(), 1);
//! ```

pub mod claim;
pub mod error;
pub mod expiry;
pub mod scheduler;
pub mod slots;
pub mod state;
pub mod transition;
pub mod types;

pub use chrono::{DateTime, NaiveDateTime, Utc};
pub use error::Rejection;
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the core trait for business logic
///
/// Reducers validate a command against the current state and either apply it
/// (returning an output plus effect descriptions) or reject it. A rejected
/// command must leave the state untouched.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// Effects produced by one reduction. Most commands yield one to three.
    pub type Effects = SmallVec<[Effect; 4]>;

    /// Result of a successful reduction
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Reduction<Output> {
        /// What the caller gets back
        pub output: Output,
        /// Side effects for the runtime to execute
        pub effects: Effects,
    }

    impl<Output> Reduction<Output> {
        /// Creates a reduction
        #[must_use]
        pub const fn new(output: Output, effects: Effects) -> Self {
            Self { output, effects }
        }
    }

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The commands this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Output`: Returned to the caller on success
    /// - `Error`: Returned to the caller on rejection
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Returned on success
        type Output;

        /// Returned on rejection
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is rejected. Nothing in
        /// `state` may have changed in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Reduction<Self::Output>, Self::Error>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values, not execution. The runtime publishes [`ChangeEvent`]s
/// while it still holds the write lock and dispatches [`NotificationIntent`]s
/// in the background.
///
/// [`ChangeEvent`]: effect::ChangeEvent
/// [`NotificationIntent`]: effect::NotificationIntent
pub mod effect {
    use crate::types::{Booking, Shop, ShopId, StaffId, StaffMember};
    use serde::{Deserialize, Serialize};

    /// Effect type - describes a side effect to be executed
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Effect {
        /// Ask the external dispatcher to notify someone
        Notify(NotificationIntent),

        /// Publish a fresh snapshot on the change feed
        Publish(ChangeEvent),
    }

    impl Effect {
        /// The notification intent, if this effect carries one
        #[must_use]
        pub const fn intent(&self) -> Option<&NotificationIntent> {
            match self {
                Effect::Notify(intent) => Some(intent),
                Effect::Publish(_) => None,
            }
        }
    }

    /// What the client (or staff) should be told
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum NotificationKind {
        /// New client must click the verification link
        VerificationRequested,
        /// Staff should look at a new request
        RequestReceived,
        /// Booking confirmed (accepted, claimed or reschedule agreed)
        Confirmed,
        /// Booking cancelled, declined or expired
        Cancelled,
        /// Staff offered a different time
        RescheduleOffered,
    }

    impl NotificationKind {
        /// Stable label for logs and metrics
        #[must_use]
        pub const fn as_str(self) -> &'static str {
            match self {
                Self::VerificationRequested => "verification_requested",
                Self::RequestReceived => "request_received",
                Self::Confirmed => "confirmed",
                Self::Cancelled => "cancelled",
                Self::RescheduleOffered => "reschedule_offered",
            }
        }
    }

    /// A request to the notification dispatcher, emitted once per transition
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NotificationIntent {
        /// What happened
        pub kind: NotificationKind,
        /// Booking snapshot after the transition
        pub booking: Booking,
    }

    /// Entity snapshot carried by a change event
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "entity", content = "snapshot", rename_all = "snake_case")]
    pub enum Change {
        /// A booking was created or transitioned
        Booking(Booking),
        /// A staff member was added or changed
        Staff(StaffMember),
        /// A staff member was removed
        StaffRemoved(StaffId),
        /// Shop settings or occupancy changed
        Shop(Shop),
    }

    /// Published after every committed mutation, scoped to a shop
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChangeEvent {
        /// Shop whose dashboards should re-render
        pub shop_id: ShopId,
        /// Complete current snapshot of the changed entity
        pub change: Change,
    }

    impl ChangeEvent {
        /// Booking change
        #[must_use]
        pub fn booking(booking: &Booking) -> Self {
            Self {
                shop_id: booking.shop_id,
                change: Change::Booking(booking.clone()),
            }
        }

        /// Shop change
        #[must_use]
        pub fn shop(shop: &Shop) -> Self {
            Self {
                shop_id: shop.id,
                change: Change::Shop(shop.clone()),
            }
        }

        /// Staff change
        #[must_use]
        pub fn staff(staff: &StaffMember) -> Self {
            Self {
                shop_id: staff.shop_id,
                change: Change::Staff(staff.clone()),
            }
        }
    }
}

/// Environment module - dependency injection traits
///
/// Time, notification delivery and the change feed are abstracted behind
/// traits so the reducer stays deterministic and the runtime can be tested
/// with recording doubles.
pub mod environment {
    use crate::effect::{ChangeEvent, NotificationIntent};
    use crate::slots::SlotRules;
    use crate::types::ShopId;
    use chrono::{DateTime, Duration, Utc};
    use futures::Stream;
    use std::future::Future;
    use std::pin::Pin;
    use thiserror::Error;

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Booking-wide timing policy
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BookingPolicy {
        /// How long a request may wait for verification or acceptance
        pub request_ttl: Duration,
        /// Slot grid and closing buffer
        pub slot_rules: SlotRules,
    }

    impl Default for BookingPolicy {
        fn default() -> Self {
            Self {
                request_ttl: Duration::minutes(10),
                slot_rules: SlotRules::default(),
            }
        }
    }

    /// Errors from the notification dispatcher
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum NotifyError {
        /// Could not reach the dispatcher
        #[error("notification transport failed: {0}")]
        Transport(String),

        /// The dispatcher refused the intent
        #[error("notification rejected: {0}")]
        Rejected(String),
    }

    impl NotifyError {
        /// Only transport failures are worth another attempt
        #[must_use]
        pub const fn is_retryable(&self) -> bool {
            matches!(self, Self::Transport(_))
        }
    }

    /// Delivers notification intents (email, push).
    ///
    /// Uses explicit `Pin<Box<dyn Future>>` returns so the runtime can hold
    /// an `Arc<dyn Notifier>`.
    pub trait Notifier: Send + Sync {
        /// Deliver one intent
        ///
        /// # Errors
        ///
        /// Returns [`NotifyError`] if delivery failed. The runtime retries
        /// [`NotifyError::Transport`] and parks everything else.
        fn notify(
            &self,
            intent: NotificationIntent,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
    }

    /// Errors from the change feed
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum FeedError {
        /// The subscriber fell behind and missed `0` events; it must re-fetch
        #[error("subscriber lagged behind by {0} events")]
        Lagged(u64),

        /// The feed has shut down
        #[error("change feed closed")]
        Closed,
    }

    /// Stream of shop-scoped change events
    pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent, FeedError>> + Send>>;

    /// Publish/subscribe contract for dashboards.
    ///
    /// `publish` is synchronous so it can run while the store still holds its
    /// write lock, which keeps feed order equal to commit order.
    pub trait ChangeFeed: Send + Sync {
        /// Publish a snapshot. Having no subscribers is not an error.
        ///
        /// # Errors
        ///
        /// Returns [`FeedError::Closed`] once the feed has been shut down.
        fn publish(&self, event: ChangeEvent) -> Result<(), FeedError>;

        /// Subscribe to changes for one shop
        fn subscribe(&self, shop_id: ShopId) -> ChangeStream;
    }
}
