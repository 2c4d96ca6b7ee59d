//! Chairbook scheduler service.
//!
//! Runs the booking store with its expiry sweeper, exports Prometheus
//! metrics, and shuts down gracefully on Ctrl+C or SIGTERM.

use anyhow::Context;
use chairbook::config::DEFAULT_LOG_FILTER;
use chairbook::{notifier, Application, Config, LogFormat, Seed};
use chairbook_core::environment::SystemClock;
use chairbook_runtime::metrics::MetricsServer;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config);

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting chairbook scheduler"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr()?);
    metrics.serve().context("failed to start metrics server")?;

    let notifier = notifier::from_config(&config.notify, config.notify_timeout())
        .context("failed to build notifier")?;

    let seed = match &config.seed_file {
        Some(path) => Seed::load(path)
            .await
            .with_context(|| format!("failed to load seed data from {}", path.display()))?,
        None => Seed::default(),
    };

    let app = Application::start(&config, Arc::new(SystemClock), notifier, seed)
        .await
        .context("failed to start scheduler")?;

    app.run().await.context("unclean shutdown")?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
