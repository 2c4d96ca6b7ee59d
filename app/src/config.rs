//! Configuration management for the chairbook service.
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) with sensible defaults. Malformed values are reported, not
//! silently replaced by the default.

use chairbook_core::environment::BookingPolicy;
use chairbook_core::slots::SlotRules;
use chairbook_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Filter applied when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "chairbook=info,chairbook_runtime=info";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },

    /// A variable parses but is outside its allowed range
    #[error("{key} {reason}")]
    OutOfRange {
        /// Variable name
        key: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Process-level settings
    pub server: ServerConfig,
    /// Slot grid, request TTL and sweep period
    pub booking: BookingConfig,
    /// Notification delivery
    pub notify: NotifyConfig,
    /// Events buffered per change feed subscriber
    pub feed_capacity: usize,
    /// JSON file of shops and staff to register at startup
    pub seed_file: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `pretty` or `json`, got `{other}`")),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host a transport shell would bind to
    pub host: String,
    /// Port a transport shell would bind to
    pub port: u16,
    /// Tracing filter directives (`RUST_LOG`)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Seconds to wait for in-flight notifications on shutdown
    pub shutdown_timeout: u64,
}

/// Booking timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Seconds an unanswered request lives before it is cancelled
    pub request_ttl_secs: u64,
    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,
    /// Minutes between offered slots
    pub slot_interval_minutes: u32,
    /// Minutes before closing during which no slot starts
    pub slot_buffer_minutes: u32,
}

/// Notification delivery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook receiving intents; intents are only logged when unset
    pub webhook_url: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Delivery attempts per intent, including the first
    pub max_attempts: usize,
    /// Backoff before the first retry, in milliseconds
    pub initial_delay_ms: u64,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let config = Self {
            server: ServerConfig {
                host: vars.string("HOST", "0.0.0.0"),
                port: vars.parse("PORT", 8080)?,
                log_level: vars.string("RUST_LOG", DEFAULT_LOG_FILTER),
                log_format: vars.parse("LOG_FORMAT", LogFormat::Pretty)?,
                metrics_host: vars.string("METRICS_HOST", "0.0.0.0"),
                metrics_port: vars.parse("METRICS_PORT", 9090)?,
                shutdown_timeout: vars.parse("SHUTDOWN_TIMEOUT", 30)?,
            },
            booking: BookingConfig {
                request_ttl_secs: vars.parse("REQUEST_TTL_SECS", 600)?,
                sweep_interval_secs: vars.parse("SWEEP_INTERVAL_SECS", 30)?,
                slot_interval_minutes: vars.parse("SLOT_INTERVAL_MINUTES", 30)?,
                slot_buffer_minutes: vars.parse("SLOT_BUFFER_MINUTES", 30)?,
            },
            notify: NotifyConfig {
                webhook_url: vars.optional("NOTIFY_WEBHOOK_URL"),
                timeout_secs: vars.parse("NOTIFY_TIMEOUT_SECS", 10)?,
                max_attempts: vars.parse("NOTIFY_MAX_ATTEMPTS", 4)?,
                initial_delay_ms: vars.parse("NOTIFY_INITIAL_DELAY_MS", 500)?,
            },
            feed_capacity: vars.parse("FEED_CAPACITY", 256)?,
            seed_file: vars.optional("SEED_FILE").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (
                self.booking.slot_interval_minutes == 0,
                "SLOT_INTERVAL_MINUTES",
                "must be at least 1",
            ),
            (
                self.booking.sweep_interval_secs == 0,
                "SWEEP_INTERVAL_SECS",
                "must be at least 1",
            ),
            (
                self.booking.request_ttl_secs == 0,
                "REQUEST_TTL_SECS",
                "must be at least 1",
            ),
            (
                self.notify.max_attempts == 0,
                "NOTIFY_MAX_ATTEMPTS",
                "must be at least 1",
            ),
            (self.feed_capacity == 0, "FEED_CAPACITY", "must be at least 1"),
        ];

        match checks.into_iter().find(|(failed, _, _)| *failed) {
            Some((_, key, reason)) => Err(ConfigError::OutOfRange { key, reason }),
            None => Ok(()),
        }
    }

    /// Request TTL and slot grid for the reducer
    #[must_use]
    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy {
            request_ttl: chrono::Duration::from_std(Duration::from_secs(
                self.booking.request_ttl_secs,
            ))
            .unwrap_or(chrono::Duration::MAX),
            slot_rules: SlotRules::new(
                self.booking.slot_interval_minutes,
                self.booking.slot_buffer_minutes,
            ),
        }
    }

    /// Backoff for notification delivery
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.notify.max_attempts.saturating_sub(1))
            .initial_delay(Duration::from_millis(self.notify.initial_delay_ms))
            .build()
    }

    /// Prometheus listener address
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `METRICS_HOST` is not an IP address.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.server.metrics_host, self.server.metrics_port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "METRICS_HOST",
            value: self.server.metrics_host.clone(),
            reason: e.to_string(),
        })
    }

    /// Period of the expiry sweeper
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.booking.sweep_interval_secs)
    }

    /// How long shutdown waits for in-flight notifications
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }

    /// Per-request webhook timeout
    #[must_use]
    pub const fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify.timeout_secs)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }
}
