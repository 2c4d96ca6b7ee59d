//! # Chairbook Testing
//!
//! Testing utilities for the scheduler core and runtime.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - Recording and failing doubles for the notifier and change feed
//! - Fixtures for a seeded shop and a ready-to-use [`Store`]
//! - [`ReducerTest`], a Given-When-Then harness for the reducer
//! - proptest strategies for domain values
//!
//! ## Example
//!
//! ```ignore
//! use chairbook_testing::{fixtures, ManualClock, RecordingNotifier};
//!
//! #[tokio::test]
//! async fn booking_flow() {
//!     let seed = fixtures::ShopFixture::new();
//!     let clock = ManualClock::new(fixtures::friday_morning());
//!     let notifier = Arc::new(RecordingNotifier::new());
//!     let store = fixtures::store(seed.state(), Arc::new(clock.clone()), notifier.clone());
//!
//!     store.send(SchedulerAction::CreateBooking(seed.request_any_staff(slot))).await?;
//!     notifier.wait_for(1, Duration::from_secs(1)).await;
//! }
//! ```
//!
//! [`Store`]: chairbook_runtime::Store

#![allow(clippy::missing_panics_doc)] // Test utilities panic on misuse

use chairbook_core::environment::Clock;
use chrono::{DateTime, Utc};

mod reducer_test;

pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chairbook_core::effect::{ChangeEvent, NotificationIntent, NotificationKind};
    use chairbook_core::environment::{ChangeFeed, ChangeStream, FeedError, Notifier, NotifyError};
    use chairbook_core::types::ShopId;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use chairbook_testing::mocks::FixedClock;
    /// use chairbook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to. Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Notifier that records every intent it is handed
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        intents: Mutex<Vec<NotificationIntent>>,
    }

    impl RecordingNotifier {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything delivered so far, in delivery order
        #[must_use]
        pub fn intents(&self) -> Vec<NotificationIntent> {
            self.intents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Kinds delivered so far, in delivery order
        #[must_use]
        pub fn kinds(&self) -> Vec<NotificationKind> {
            self.intents().into_iter().map(|i| i.kind).collect()
        }

        /// Wait until at least `count` intents have arrived.
        ///
        /// Delivery runs on spawned tasks, so tests poll for it.
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
            let deadline = tokio::time::Instant::now() + timeout;
            while tokio::time::Instant::now() < deadline {
                if self.intents().len() >= count {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.intents().len() >= count
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(
            &self,
            intent: NotificationIntent,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
            Box::pin(async move {
                self.intents
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(intent);
                Ok(())
            })
        }
    }

    /// Notifier that fails a set number of times before succeeding
    #[derive(Debug)]
    pub struct FailingNotifier {
        failures_remaining: AtomicUsize,
        attempts: AtomicUsize,
        error: NotifyError,
        delivered: RecordingNotifier,
    }

    impl FailingNotifier {
        /// Fail the first `failures` attempts
        #[must_use]
        pub fn times(failures: usize) -> Self {
            Self {
                failures_remaining: AtomicUsize::new(failures),
                attempts: AtomicUsize::new(0),
                error: NotifyError::Transport("mail relay unreachable".to_string()),
                delivered: RecordingNotifier::new(),
            }
        }

        /// Never succeed
        #[must_use]
        pub fn always() -> Self {
            Self::times(usize::MAX)
        }

        /// Refuse every intent outright
        #[must_use]
        pub fn rejecting() -> Self {
            Self {
                error: NotifyError::Rejected("unknown recipient".to_string()),
                ..Self::always()
            }
        }

        /// Attempts made, successful or not
        #[must_use]
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        /// Intents that eventually got through
        #[must_use]
        pub fn delivered(&self) -> Vec<NotificationIntent> {
            self.delivered.intents()
        }
    }

    impl Notifier for FailingNotifier {
        fn notify(
            &self,
            intent: NotificationIntent,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let failed = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();

            if failed {
                let error = self.error.clone();
                Box::pin(async move { Err(error) })
            } else {
                self.delivered.notify(intent)
            }
        }
    }

    /// Change feed that records everything published.
    ///
    /// Subscriptions replay what was recorded for the shop at subscribe
    /// time and then end.
    #[derive(Debug, Default)]
    pub struct RecordingFeed {
        events: Mutex<Vec<ChangeEvent>>,
    }

    impl RecordingFeed {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything published so far, in publish order
        #[must_use]
        pub fn events(&self) -> Vec<ChangeEvent> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Events for one shop, in publish order
        #[must_use]
        pub fn events_for(&self, shop_id: ShopId) -> Vec<ChangeEvent> {
            self.events()
                .into_iter()
                .filter(|e| e.shop_id == shop_id)
                .collect()
        }
    }

    impl ChangeFeed for RecordingFeed {
        fn publish(&self, event: ChangeEvent) -> Result<(), FeedError> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
            Ok(())
        }

        fn subscribe(&self, shop_id: ShopId) -> ChangeStream {
            Box::pin(futures::stream::iter(
                self.events_for(shop_id).into_iter().map(Ok),
            ))
        }
    }
}

/// Seeded shops, staff, requests and stores
pub mod fixtures {
    use super::mocks::FixedClock;
    use chairbook_core::environment::{ChangeFeed, Clock, Notifier};
    use chairbook_core::scheduler::{BookingRequest, SchedulerEnvironment};
    use chairbook_core::state::SchedulerState;
    use chairbook_core::types::{ClientIdentity, Money, ServiceItem, Shop, ShopId, StaffId, StaffMember};
    use chairbook_runtime::feed::BroadcastFeed;
    use chairbook_runtime::retry::RetryPolicy;
    use chairbook_runtime::{Store, StoreConfig};
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    /// Friday 2025-03-14 10:00 UTC
    #[must_use]
    pub fn friday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Local time on the fixture Friday
    #[must_use]
    pub fn friday_at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap_or_default()
    }

    /// A client with a distinct email
    #[must_use]
    pub fn client(name: &str) -> ClientIdentity {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        ClientIdentity::new(name, email, "07700 900123")
    }

    /// Shop open 09:00-19:00 UTC with two services and two staff on duty
    #[derive(Debug, Clone)]
    pub struct ShopFixture {
        /// The shop
        pub shop: Shop,
        /// First staff member, on duty
        pub alice: StaffMember,
        /// Second staff member, on duty
        pub bob: StaffMember,
    }

    impl ShopFixture {
        /// Build a fresh fixture with new IDs
        #[must_use]
        pub fn new() -> Self {
            let shop = Shop::new(ShopId::new(), "Fades & Co").with_menu(vec![
                ServiceItem::new("Skin Fade", 45, Money::from_pounds(20)),
                ServiceItem::new("Beard Trim", 30, Money::from_pounds(10)),
            ]);
            let alice = StaffMember::new(StaffId::new(), shop.id, "Alice").on_duty();
            let bob = StaffMember::new(StaffId::new(), shop.id, "Bob").on_duty();
            Self { shop, alice, bob }
        }

        /// State containing the shop and both staff members
        #[must_use]
        pub fn state(&self) -> SchedulerState {
            let mut state = SchedulerState::default();
            state.shops.insert(self.shop.id, self.shop.clone());
            state.staff.insert(self.alice.id, self.alice.clone());
            state.staff.insert(self.bob.id, self.bob.clone());
            state
        }

        /// "Any staff" request for a Skin Fade
        #[must_use]
        pub fn request_any_staff(&self, slot: NaiveDateTime) -> BookingRequest {
            BookingRequest {
                shop_id: self.shop.id,
                client: client("Ada Lovelace"),
                service: "Skin Fade".to_string(),
                staff_id: None,
                slot,
            }
        }

        /// Request for a specific staff member
        #[must_use]
        pub fn request_with(&self, staff: &StaffMember, slot: NaiveDateTime) -> BookingRequest {
            BookingRequest {
                staff_id: Some(staff.id),
                ..self.request_any_staff(slot)
            }
        }
    }

    impl Default for ShopFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Environment frozen at [`friday_morning`]
    #[must_use]
    pub fn frozen_env() -> SchedulerEnvironment {
        SchedulerEnvironment::new(Arc::new(FixedClock::new(friday_morning())))
    }

    /// Retry policy fast enough for tests
    #[must_use]
    pub fn fast_retry() -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(2)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .jitter(false)
            .build()
    }

    /// Store over `state` with a broadcast feed and fast retries
    #[must_use]
    pub fn store(state: SchedulerState, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Store {
        store_with_feed(state, clock, notifier, Arc::new(BroadcastFeed::default()))
    }

    /// Store over `state` publishing to `feed`
    #[must_use]
    pub fn store_with_feed(
        state: SchedulerState,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Store {
        Store::with_config(
            state,
            SchedulerEnvironment::new(clock),
            feed,
            notifier,
            StoreConfig {
                dlq_max_size: 16,
                retry_policy: fast_retry(),
            },
        )
    }
}

/// Property-based testing strategies
pub mod properties {
    use chairbook_core::transition::{BookingEvent, CancelReason};
    use chairbook_core::types::BookingStatus;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    /// Any wall-clock time as `HH:MM`
    pub fn clock_time() -> impl Strategy<Value = String> {
        (0u32..24, 0u32..60).prop_map(|(h, m)| format!("{h:02}:{m:02}"))
    }

    /// Any status
    pub fn status() -> impl Strategy<Value = BookingStatus> {
        proptest::sample::select(BookingStatus::ALL.to_vec())
    }

    /// Any event, with reschedule proposals on the fixture Friday
    pub fn event() -> impl Strategy<Value = BookingEvent> {
        prop_oneof![
            Just(BookingEvent::VerifyEmail),
            Just(BookingEvent::Accept),
            Just(BookingEvent::Decline),
            Just(BookingEvent::Claim),
            local_time().prop_map(|proposed_at| BookingEvent::ProposeReschedule { proposed_at }),
            Just(BookingEvent::AcceptReschedule),
            Just(BookingEvent::DeclineReschedule),
            Just(BookingEvent::Finish),
            Just(BookingEvent::Cancel {
                reason: CancelReason::Manual
            }),
            Just(BookingEvent::Cancel {
                reason: CancelReason::NoShow
            }),
            Just(BookingEvent::Expire),
            Just(BookingEvent::AutoComplete),
        ]
    }

    /// Minute-resolution local time within two days of the fixture Friday
    pub fn local_time() -> impl Strategy<Value = NaiveDateTime> {
        (0i64..2 * 24 * 60).prop_map(|minutes| {
            NaiveDate::from_ymd_opt(2025, 3, 14)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default()
                + Duration::minutes(minutes)
        })
    }
}

/// Install a test-friendly tracing subscriber. Safe to call more than once.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub use fixtures::ShopFixture;
pub use mocks::{FailingNotifier, FixedClock, ManualClock, RecordingFeed, RecordingNotifier};

/// Clock fixed at [`fixtures::friday_morning`]
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(fixtures::friday_morning())
}
