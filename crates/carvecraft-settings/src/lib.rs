//! CarveCraft Settings Crate
//!
//! Handles application configuration and its persistence.

pub mod config;
pub mod error;

pub use config::{
    Config, ConnectionConfig, ConsoleConfig, FlowControlMode, JobConfig, JogConfig,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
