//! Configuration loading and validation

#[expect(clippy::module_inception, reason = "mirrors the file layout of the other modules")]
mod config;

pub use config::{Config, DEFAULT_CONFIG_FILE, DEFAULT_CONFIG_TOML};
