//! Application wiring and lifecycle.
//!
//! Builds the store from configuration, starts the background tasks that
//! keep it moving, and takes them down again in order:
//!
//! 1. Signal the sweeper and feed mirrors to stop
//! 2. Refuse new commands and wait for in-flight notifications
//! 3. Close the change feed

use crate::config::Config;
use crate::seed::{Seed, SeedError};
use chairbook_core::environment::{ChangeFeed, Clock, Notifier};
use chairbook_core::scheduler::SchedulerEnvironment;
use chairbook_core::types::ShopId;
use chairbook_runtime::feed::BroadcastFeed;
use chairbook_runtime::sweeper::ExpirySweeper;
use chairbook_runtime::{Store, StoreConfig, StoreError};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Startup and shutdown failures
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Seed data could not be loaded or registered
    #[error(transparent)]
    Seed(#[from] SeedError),

    /// In-flight work did not finish in time
    #[error(transparent)]
    Shutdown(#[from] StoreError),
}

/// A running scheduler with its background tasks.
pub struct Application {
    store: Store,
    feed: Arc<BroadcastFeed>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Build the store, register seed data, and start the sweeper plus one
    /// feed mirror per seeded shop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Seed`] if seed data is rejected.
    pub async fn start(
        config: &Config,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        seed: Seed,
    ) -> Result<Self, BootstrapError> {
        let environment = SchedulerEnvironment::new(clock).with_policy(config.booking_policy());
        let feed = Arc::new(BroadcastFeed::new(config.feed_capacity));
        let store_config = StoreConfig {
            retry_policy: config.retry_policy(),
            ..StoreConfig::default()
        };

        let store = Store::with_config(
            chairbook_core::state::SchedulerState::default(),
            environment,
            Arc::clone(&feed) as Arc<dyn ChangeFeed>,
            notifier,
            store_config,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // Mirrors subscribe before seeding so the registrations are logged too
        for shop in &seed.shops {
            tasks.push((
                format!("feed-mirror-{}", shop.id),
                spawn_feed_mirror(&feed, shop.id, shutdown_rx.clone()),
            ));
        }
        seed.apply(&store).await?;

        let sweeper = ExpirySweeper::new(store.clone(), config.sweep_interval());
        tasks.push(("expiry-sweeper".to_string(), sweeper.spawn(shutdown_rx)));

        info!(
            request_ttl_secs = config.booking.request_ttl_secs,
            sweep_interval_secs = config.booking.sweep_interval_secs,
            background_tasks = tasks.len(),
            "Scheduler started"
        );

        Ok(Self {
            store,
            feed,
            shutdown_tx,
            tasks,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Handle for sending commands and running queries
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Run until Ctrl+C or SIGTERM, then shut down.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Shutdown`] if notifications were still in
    /// flight when the shutdown timeout expired.
    pub async fn run(self) -> Result<(), BootstrapError> {
        shutdown_signal().await;
        self.shutdown().await
    }

    /// Stop background tasks, drain notifications and close the feed.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Shutdown`] if notifications were still in
    /// flight when the shutdown timeout expired.
    pub async fn shutdown(self) -> Result<(), BootstrapError> {
        info!("Stopping background tasks");
        let _ = self.shutdown_tx.send(true);

        for (name, handle) in self.tasks {
            match tokio::time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(())) => info!(task = %name, "Background task stopped"),
                Ok(Err(e)) => warn!(task = %name, error = %e, "Background task failed"),
                Err(_) => warn!(task = %name, "Background task shutdown timed out"),
            }
        }

        let drained = self.store.shutdown(self.shutdown_timeout).await;
        self.feed.close();

        for letter in self.store.dead_letters().drain() {
            warn!(
                kind = letter.payload.kind.as_str(),
                booking_id = %letter.payload.booking.id,
                attempts = letter.attempts,
                failed_at = %letter.failed_at,
                error = %letter.error_message,
                "Notification left undelivered"
            );
        }

        drained?;
        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Log every change published for one shop until shutdown.
fn spawn_feed_mirror(
    feed: &BroadcastFeed,
    shop_id: ShopId,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut changes = feed.subscribe(shop_id);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                next = changes.next() => match next {
                    Some(Ok(event)) => {
                        tracing::debug!(%shop_id, change = ?event.change, "Change published");
                    }
                    Some(Err(error)) => {
                        warn!(%shop_id, %error, "Feed mirror fell behind");
                    }
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully..."),
    }
}
