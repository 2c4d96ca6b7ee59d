//! # Chairbook
//!
//! Service shell around the chairbook scheduler: configuration, notifier
//! adapters, seed data and the lifecycle of the store's background tasks.
//!
//! The binary in `main.rs` is a thin wrapper over [`bootstrap::Application`].

pub mod bootstrap;
pub mod config;
pub mod notifier;
pub mod seed;

pub use bootstrap::{Application, BootstrapError};
pub use config::{Config, ConfigError, LogFormat};
pub use seed::Seed;
