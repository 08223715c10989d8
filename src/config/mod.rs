//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: top-level `Config`, server identity, loading
//! - [`links`]: the uplink block (hub address and credentials)
//! - [`limits`]: framing and keep-alive limits
//! - [`clients`]: locally-owned pseudo-clients introduced at start
//! - [`validation`]: startup checks that report every problem at once

mod clients;
mod limits;
mod links;
mod types;
pub mod validation;

pub use clients::ClientBlock;
pub use limits::LimitsConfig;
pub use links::LinkBlock;
pub use types::{Config, ConfigError, LogConfig, LogFormat, ModesConfig, ServerConfig};
pub use validation::{ValidationError, validate};
