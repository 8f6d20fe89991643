//! Persistence: TOML configuration.

pub mod config;
