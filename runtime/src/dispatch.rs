//! Background delivery of notification intents.
//!
//! Intents are produced by committed transitions. Delivery happens after the
//! store has released its lock. Transport failures are retried with backoff.
//! An intent ends up in the dead letter queue once retries run out or the
//! notifier rejects it outright. A failed notification never
//! rolls back the transition that produced it.

use crate::metrics::NotificationMetrics;
use crate::retry::{retry_with_backoff, DeadLetterQueue, RetryPolicy};
use chairbook_core::effect::NotificationIntent;
use chairbook_core::environment::{NotifyError, Notifier};
use std::sync::Arc;
use std::time::Instant;

/// Delivers intents through a [`Notifier`] with retry and dead-lettering.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    dlq: DeadLetterQueue<NotificationIntent>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher
    #[must_use]
    pub fn new(
        notifier: Arc<dyn Notifier>,
        policy: RetryPolicy,
        dlq: DeadLetterQueue<NotificationIntent>,
    ) -> Self {
        Self {
            notifier,
            policy,
            dlq,
        }
    }

    /// Intents that exhausted their retries
    #[must_use]
    pub const fn dead_letters(&self) -> &DeadLetterQueue<NotificationIntent> {
        &self.dlq
    }

    /// Deliver one intent, retrying transport failures.
    ///
    /// # Errors
    ///
    /// Returns the last [`NotifyError`] once retries are exhausted, or the
    /// first [`NotifyError::Rejected`]. The intent has already been parked in
    /// the dead letter queue by then.
    #[tracing::instrument(
        skip(self, intent),
        name = "notify",
        fields(kind = intent.kind.as_str(), booking_id = %intent.booking.id)
    )]
    pub async fn dispatch(&self, intent: NotificationIntent) -> Result<(), NotifyError> {
        let start = Instant::now();
        let mut attempts = 0;
        let result = retry_with_backoff(&self.policy, NotifyError::is_retryable, || {
            attempts += 1;
            let notifier = Arc::clone(&self.notifier);
            let intent = intent.clone();
            async move { notifier.notify(intent).await }
        })
        .await;

        match result {
            Ok(()) => {
                NotificationMetrics::record_dispatched(intent.kind, start.elapsed());
                tracing::debug!("Notification delivered");
                Ok(())
            },
            Err(error) => {
                NotificationMetrics::record_failed(intent.kind);
                tracing::error!(%error, "Notification undeliverable, parking in DLQ");
                self.dlq.push(intent, error.to_string(), attempts);
                Err(error)
            },
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("policy", &self.policy)
            .field("dead_letters", &self.dlq.len())
            .finish_non_exhaustive()
    }
}
