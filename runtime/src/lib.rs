//! # Chairbook Runtime
//!
//! Runtime for the scheduler reducer.
//!
//! The [`Store`](store::Store) serialises every command through one write
//! lock, publishes change snapshots while still holding it, and hands
//! notification intents to a background dispatcher once it has let go.
//!
//! ## Core Components
//!
//! - **Store**: state, reducer and effect execution
//! - **Change feed**: [`BroadcastFeed`](feed::BroadcastFeed), shop-scoped snapshots in commit order
//! - **Dispatcher**: [`NotificationDispatcher`](dispatch::NotificationDispatcher), retry plus dead letters
//! - **Sweeper**: [`ExpirySweeper`](sweeper::ExpirySweeper), closes stale requests and finished walk-ins
//!
//! ## Example
//!
//! ```ignore
//! use chairbook_runtime::store::Store;
//!
//! let store = Store::new(SchedulerState::default(), environment, feed, notifier);
//!
//! let outcome = store.send(SchedulerAction::CreateBooking(request)).await?;
//! let slots = store.slots(shop_id).await?;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Background notification delivery
pub mod dispatch;

/// Broadcast-backed change feed
pub mod feed;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Periodic expiry and auto-completion
pub mod sweeper;

/// Error types for the Store runtime
pub mod error {
    use chairbook_core::Rejection;
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The reducer refused the command; state is unchanged
        #[error(transparent)]
        Rejected(#[from] Rejection),

        /// Store is shutting down and not accepting new commands
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for notifications to drain
        #[error("Shutdown timed out with {0} dispatches still running")]
        ShutdownTimeout(usize),
    }

    impl StoreError {
        /// The rejection, if the reducer produced one
        #[must_use]
        pub const fn rejection(&self) -> Option<&Rejection> {
            match self {
                Self::Rejected(rejection) => Some(rejection),
                _ => None,
            }
        }

        /// True when the caller acted on stale data and should re-fetch
        #[must_use]
        pub const fn should_refresh(&self) -> bool {
            match self {
                Self::Rejected(rejection) => rejection.should_refresh(),
                _ => false,
            }
        }
    }
}

pub use error::StoreError;

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Operating normally
    Healthy,
    /// Working, but something needs attention
    Degraded,
    /// Not working
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    pub message: Option<String>,

    /// Optional metadata (e.g., queue sizes)
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    fn with_status(component: impl Into<String>, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            component: component.into(),
            status,
            message,
            metadata: Vec::new(),
        }
    }

    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Healthy, None)
    }

    /// Create a degraded check result
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Degraded, Some(message.into()))
    }

    /// Create an unhealthy check result
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(component, HealthStatus::Unhealthy, Some(message.into()))
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Decrements the in-flight dispatch counter on drop, panics included
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - the runtime around [`SchedulerReducer`]
///
/// [`SchedulerReducer`]: chairbook_core::scheduler::SchedulerReducer
pub mod store {
    use super::{Arc, AtomicUsize, HealthCheck, Ordering, PendingGuard, StoreError};
    use crate::dispatch::NotificationDispatcher;
    use crate::metrics::BookingMetrics;
    use crate::retry::{DeadLetterQueue, RetryPolicy};
    use chairbook_core::effect::{Effect, NotificationIntent};
    use chairbook_core::environment::{ChangeFeed, ChangeStream, Notifier};
    use chairbook_core::expiry::{due_transitions, DueTransition};
    use chairbook_core::reducer::Reducer;
    use chairbook_core::scheduler::{query_slots, Outcome, SchedulerAction, SchedulerEnvironment, SchedulerReducer};
    use chairbook_core::state::SchedulerState;
    use chairbook_core::types::{Booking, BookingId, Shop, ShopId, StaffId};
    use chairbook_core::NaiveDateTime;
    use std::sync::atomic::AtomicBool;
    use std::time::{Duration, Instant};
    use tokio::sync::RwLock;

    /// Store tuning
    #[derive(Debug, Clone)]
    pub struct StoreConfig {
        /// Undeliverable notifications kept for inspection
        pub dlq_max_size: usize,
        /// Backoff for notification delivery
        pub retry_policy: RetryPolicy,
    }

    impl Default for StoreConfig {
        fn default() -> Self {
            Self {
                dlq_max_size: 1000,
                retry_policy: RetryPolicy::default(),
            }
        }
    }

    /// The Store - single writer of scheduler state
    ///
    /// # Concurrency
    ///
    /// - Commands serialise on one write lock; the reducer runs under it
    /// - Change events are published before the lock is released, so the
    ///   feed order is the commit order
    /// - Notifications are delivered in spawned tasks after the lock is
    ///   released; a failed delivery never undoes a commit
    ///
    /// Clones share state, feed and dispatcher.
    pub struct Store {
        state: Arc<RwLock<SchedulerState>>,
        reducer: SchedulerReducer,
        environment: SchedulerEnvironment,
        feed: Arc<dyn ChangeFeed>,
        dispatcher: NotificationDispatcher,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
    }

    impl Store {
        /// Create a store with the default configuration
        #[must_use]
        pub fn new(
            initial_state: SchedulerState,
            environment: SchedulerEnvironment,
            feed: Arc<dyn ChangeFeed>,
            notifier: Arc<dyn Notifier>,
        ) -> Self {
            Self::with_config(
                initial_state,
                environment,
                feed,
                notifier,
                StoreConfig::default(),
            )
        }

        /// Create a store with custom retry and dead letter settings
        #[must_use]
        pub fn with_config(
            initial_state: SchedulerState,
            environment: SchedulerEnvironment,
            feed: Arc<dyn ChangeFeed>,
            notifier: Arc<dyn Notifier>,
            config: StoreConfig,
        ) -> Self {
            let dispatcher = NotificationDispatcher::new(
                notifier,
                config.retry_policy,
                DeadLetterQueue::new(config.dlq_max_size),
            );
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: SchedulerReducer::new(),
                environment,
                feed,
                dispatcher,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Send a command to the store
        ///
        /// 1. Acquires the write lock
        /// 2. Runs the reducer
        /// 3. Publishes change events, still under the lock
        /// 4. Releases the lock and dispatches notifications in the background
        ///
        /// # Errors
        ///
        /// - [`StoreError::Rejected`] if the reducer refused the command
        /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
        #[tracing::instrument(skip(self, action), name = "store_send", fields(action = action.name()))]
        pub async fn send(&self, action: SchedulerAction) -> Result<Outcome, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejecting command: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            let name = action.name();
            metrics::counter!("store.commands.total", "action" => name).increment(1);

            let transition = match &action {
                SchedulerAction::ApplyTransition { event, .. } => Some(event.name()),
                _ => None,
            };
            let booking_command = transition.is_some()
                || matches!(
                    action,
                    SchedulerAction::CreateBooking(_) | SchedulerAction::StartWalkIn { .. }
                );

            let (output, intents) = {
                let mut state = self.state.write().await;

                let start = Instant::now();
                let result = self.reducer.reduce(&mut state, action, &self.environment);
                BookingMetrics::record_reduce(start.elapsed());

                let reduction = match result {
                    Ok(reduction) => reduction,
                    Err(rejection) => {
                        metrics::counter!("store.commands.rejected", "action" => name).increment(1);
                        if booking_command {
                            BookingMetrics::record_rejection(rejection.kind());
                        }
                        tracing::debug!(%rejection, "Command rejected");
                        return Err(rejection.into());
                    },
                };

                let mut intents = Vec::new();
                for effect in reduction.effects {
                    self.execute_effect(effect, &mut intents);
                }
                (reduction.output, intents)
            };

            if let Some(event) = transition {
                BookingMetrics::record_transition(event);
            } else if let Outcome::Booking(booking) = &output {
                BookingMetrics::record_created(booking.is_walk_in());
                tracing::info!(
                    booking_id = %booking.id,
                    status = %booking.status,
                    "Booking created"
                );
            }

            if !intents.is_empty() {
                self.spawn_dispatch(intents);
            }
            Ok(output)
        }

        /// Publishes inline and collects notification intents for later.
        fn execute_effect(&self, effect: Effect, intents: &mut Vec<NotificationIntent>) {
            match effect {
                Effect::Notify(intent) => intents.push(intent),
                Effect::Publish(event) => {
                    let shop_id = event.shop_id;
                    if let Err(error) = self.feed.publish(event) {
                        metrics::counter!("store.feed.publish_errors").increment(1);
                        tracing::warn!(%shop_id, %error, "Change event not published");
                    }
                },
            }
        }

        /// Intents from one command are delivered in order, on one task.
        fn spawn_dispatch(&self, intents: Vec<NotificationIntent>) {
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let guard = PendingGuard(Arc::clone(&self.pending_effects));
            let dispatcher = self.dispatcher.clone();

            tokio::spawn(async move {
                let _guard = guard;
                for intent in intents {
                    // Failures are logged and dead-lettered by the dispatcher
                    let _ = dispatcher.dispatch(intent).await;
                }
            });
        }

        /// Read state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&SchedulerState) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Offerable start times for a shop, computed from the current clock
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Rejected`] if the shop does not exist.
        pub async fn slots(&self, shop_id: ShopId) -> Result<Vec<NaiveDateTime>, StoreError> {
            let state = self.state.read().await;
            Ok(query_slots(&state, shop_id, &self.environment)?)
        }

        /// Current snapshot of one booking
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Rejected`] if the booking does not exist.
        pub async fn booking(&self, booking_id: BookingId) -> Result<Booking, StoreError> {
            let state = self.state.read().await;
            Ok(state.booking(booking_id)?.clone())
        }

        /// Current snapshot of one shop
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Rejected`] if the shop does not exist.
        pub async fn shop(&self, shop_id: ShopId) -> Result<Shop, StoreError> {
            let state = self.state.read().await;
            Ok(state.shop(shop_id)?.clone())
        }

        /// Every booking at a shop, in schedule order
        pub async fn shop_bookings(&self, shop_id: ShopId) -> Vec<Booking> {
            self.state(|s| s.shop_bookings(shop_id).into_iter().cloned().collect())
                .await
        }

        /// "Any staff" requests waiting to be claimed, oldest first
        pub async fn claimable(&self, shop_id: ShopId) -> Vec<Booking> {
            self.state(|s| s.claimable(shop_id).into_iter().cloned().collect())
                .await
        }

        /// Upcoming work assigned to one staff member
        pub async fn staff_schedule(&self, staff_id: StaffId) -> Vec<Booking> {
            self.state(|s| s.staff_schedule(staff_id).into_iter().cloned().collect())
                .await
        }

        /// Bookings the sweeper should close right now
        pub async fn due_transitions(&self) -> Vec<DueTransition> {
            let now = self.environment.clock.now();
            let ttl = self.environment.policy.request_ttl;
            self.state(|s| due_transitions(s, now, ttl)).await
        }

        /// Subscribe to committed changes for one shop
        #[must_use]
        pub fn subscribe(&self, shop_id: ShopId) -> ChangeStream {
            self.feed.subscribe(shop_id)
        }

        /// Notifications that could not be delivered
        #[must_use]
        pub const fn dead_letters(&self) -> &DeadLetterQueue<NotificationIntent> {
            self.dispatcher.dead_letters()
        }

        /// Dispatch tasks still running
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Injected clock and policy
        #[must_use]
        pub const fn environment(&self) -> &SchedulerEnvironment {
            &self.environment
        }

        /// Check if the store is shutting down
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Health based on the notification dead letter queue
        ///
        /// Degraded above half capacity, unhealthy when full.
        #[must_use]
        pub fn health(&self) -> HealthCheck {
            let dlq = self.dead_letters();
            let (size, capacity) = (dlq.len(), dlq.max_size());

            let check = if size >= capacity {
                HealthCheck::unhealthy("store", "Notification dead letter queue is full")
            } else if size * 2 > capacity {
                HealthCheck::degraded("store", format!("{size} undeliverable notifications"))
            } else {
                HealthCheck::healthy("store")
            };

            check
                .with_metadata("dlq_size", size.to_string())
                .with_metadata("dlq_capacity", capacity.to_string())
                .with_metadata("pending_dispatches", self.pending_effects().to_string())
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Stops accepting new commands
        /// 2. Waits for in-flight notification dispatches
        /// 3. Returns once they are done or the timeout elapses
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if dispatches are still
        /// running after `timeout`.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = Instant::now();
            let poll_interval = Duration::from_millis(100);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All dispatches completed, shutdown successful");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} dispatches still running",
                        pending
                    );
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tracing::debug!(
                    pending_effects = pending,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Waiting for dispatches to complete"
                );

                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    impl Clone for Store {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer,
                environment: self.environment.clone(),
                feed: Arc::clone(&self.feed),
                dispatcher: self.dispatcher.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
            }
        }
    }

    impl std::fmt::Debug for Store {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field("dispatcher", &self.dispatcher)
                .field("pending_effects", &self.pending_effects())
                .field("shutting_down", &self.is_shutting_down())
                .finish_non_exhaustive()
        }
    }
}

pub use store::{Store, StoreConfig};
