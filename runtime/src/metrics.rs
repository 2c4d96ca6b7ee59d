//! Prometheus metrics for the scheduler.
//!
//! Covers:
//! - Commands and reducer latency
//! - Booking creations, transitions and rejections
//! - Notification delivery
//! - Expiry sweeps
//!
//! # Example
//!
//! ```rust,no_run
//! use chairbook_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Scrape endpoint on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.serve()?;
//! # Ok(())
//! # }
//! ```

use chairbook_core::effect::NotificationKind;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

const LATENCY_BUCKETS: &[f64] = &[
    0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics server.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    fn builder() -> Result<PrometheusBuilder, MetricsError> {
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .map_err(|e| MetricsError::Build(e.to_string()))
    }

    /// Install the recorder without an HTTP listener; use [`render`](Self::render)
    /// to produce the exposition text.
    ///
    /// A recorder that is already installed (e.g. by another test) is
    /// tolerated with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        match Self::builder()?.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Install the recorder and serve `/metrics` on the configured address.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built, the listener cannot
    /// bind, or a recorder is already installed.
    pub fn serve(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = Self::builder()?
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!("Metrics exporter stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Store
    describe_counter!("store.commands.total", "Commands received, by action");
    describe_counter!("store.commands.rejected", "Commands rejected by the reducer");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent in the reducer while holding the write lock"
    );
    describe_counter!("store.feed.publish_errors", "Change events the feed refused");

    // Bookings
    describe_counter!("bookings.created", "Bookings created, by kind");
    describe_counter!("bookings.transitions", "Lifecycle transitions, by event");
    describe_counter!("bookings.rejections", "Rejected booking commands, by kind");

    // Notifications
    describe_counter!("notifications.dispatched", "Notifications delivered, by kind");
    describe_counter!("notifications.failed", "Notifications that exhausted retries");
    describe_histogram!(
        "notifications.delivery.duration_seconds",
        "Time to deliver a notification, retries included"
    );
    describe_gauge!("dlq.size", "Undeliverable notifications awaiting inspection");

    // Sweeper
    describe_counter!("sweeper.runs", "Expiry sweeps executed");
    describe_counter!("sweeper.transitions", "Bookings expired or auto-completed, by event");
}

/// Booking metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record a new booking.
    pub fn record_created(walk_in: bool) {
        let kind = if walk_in { "walk_in" } else { "appointment" };
        counter!("bookings.created", "kind" => kind).increment(1);
    }

    /// Record a lifecycle transition.
    pub fn record_transition(event: &'static str) {
        counter!("bookings.transitions", "event" => event).increment(1);
    }

    /// Record a rejected command.
    pub fn record_rejection(kind: &'static str) {
        counter!("bookings.rejections", "kind" => kind).increment(1);
    }

    /// Record reducer time for one command.
    pub fn record_reduce(duration: Duration) {
        histogram!("store.reducer.duration_seconds").record(duration.as_secs_f64());
    }
}

/// Notification metrics recorder.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a delivered notification.
    pub fn record_dispatched(kind: NotificationKind, duration: Duration) {
        counter!("notifications.dispatched", "kind" => kind.as_str()).increment(1);
        histogram!("notifications.delivery.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a notification that exhausted its retries.
    pub fn record_failed(kind: NotificationKind) {
        counter!("notifications.failed", "kind" => kind.as_str()).increment(1);
    }
}

/// Sweeper metrics recorder.
pub struct SweeperMetrics;

impl SweeperMetrics {
    /// Record one sweep.
    pub fn record_run() {
        counter!("sweeper.runs").increment(1);
    }

    /// Record a transition applied by the sweeper.
    pub fn record_transition(event: &'static str) {
        counter!("sweeper.transitions", "event" => event).increment(1);
    }
}
