//! Configuration module for the Runixo agent.
//!
//! Handles loading and validating agent configuration from TOML files.

mod settings;

pub use settings::*;
