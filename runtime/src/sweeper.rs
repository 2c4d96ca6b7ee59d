//! Periodic expiry of unanswered requests and completion of finished walk-ins.
//!
//! Each sweep selects due bookings under a read lock, then applies them one
//! at a time through the store with the observed version as a precondition.
//! Anything a person changed in between is skipped, not overwritten.

use crate::metrics::SweeperMetrics;
use crate::store::Store;
use crate::StoreError;
use chairbook_core::scheduler::SchedulerAction;
use chairbook_core::transition::{Actor, BookingEvent};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What one sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Unanswered requests cancelled by expiry
    pub expired: usize,
    /// Walk-ins moved to `Completed`
    pub completed: usize,
    /// Bookings that changed after selection
    pub skipped: usize,
    /// Transitions rejected for any other reason
    pub failed: usize,
}

impl SweepReport {
    /// Number of bookings actually transitioned
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.expired + self.completed
    }
}

/// Background expiry job
#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    store: Store,
    interval: Duration,
}

impl ExpirySweeper {
    /// Creates a sweeper that runs every `interval`
    #[must_use]
    pub const fn new(store: Store, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one sweep. Safe to call repeatedly: a second sweep at the same
    /// instant finds nothing due.
    #[tracing::instrument(skip(self), name = "sweep")]
    pub async fn sweep_once(&self) -> SweepReport {
        SweeperMetrics::record_run();
        let mut report = SweepReport::default();

        for due in self.store.due_transitions().await {
            let action = SchedulerAction::ApplyTransition {
                booking_id: due.booking_id,
                event: due.event,
                actor: Actor::System,
                expected_version: Some(due.expected_version),
            };

            match self.store.send(action).await {
                Ok(_) => {
                    SweeperMetrics::record_transition(due.event.name());
                    if due.event == BookingEvent::Expire {
                        report.expired += 1;
                    } else {
                        report.completed += 1;
                    }
                },
                Err(StoreError::ShutdownInProgress) => {
                    tracing::debug!("Store shutting down, abandoning sweep");
                    break;
                },
                Err(error) if error.should_refresh() => {
                    tracing::debug!(booking_id = %due.booking_id, %error, "Booking moved on, skipping");
                    report.skipped += 1;
                },
                Err(error) => {
                    tracing::warn!(booking_id = %due.booking_id, %error, "Sweep transition rejected");
                    report.failed += 1;
                },
            }
        }

        if report.applied() > 0 {
            tracing::info!(
                expired = report.expired,
                completed = report.completed,
                skipped = report.skipped,
                "Sweep applied transitions"
            );
        }
        report
    }

    /// Sweep every `interval` until `shutdown` flips to `true` or its sender
    /// is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Expiry sweeper stopped");
        })
    }
}
