//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config, server identity and command settings
//! - [`dispatch`]: Worker pool sizing and rebalancing thresholds
//! - [`output`]: Outbound line pacing and length limits
//! - [`validation`]: Startup checks returning every problem found

mod dispatch;
mod output;
mod types;
pub mod validation;

pub use dispatch::DispatchConfig;
pub use output::OutputConfig;
pub use types::{CommandsConfig, Config, ConfigError, ServerConfig};
pub use validation::{ValidationError, validate};
