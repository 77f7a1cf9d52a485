//! Configuration system for the stunnel-launcher binary.
//!
//! This module provides TOML configuration loading with hierarchy merging.
//! A config file describes where stunnel lives, where temporary files go,
//! global stunnel options and the services to run.
//!
//! # Configuration Hierarchy
//!
//! 1. System config: `/etc/stunnel-launcher/config.toml`
//! 2. User config: `~/.config/stunnel-launcher/config.toml`
//! 3. Additional config file (via `--config` flag)
//! 4. CLI flags (highest priority)
//!
//! # Service Configuration
//!
//! ```toml
//! [[services]]
//! name = "imap"
//! client = true
//! accept = { host = "localhost", port = 1143 }
//! connect = [{ host = "imap.example.com", port = 993 }]
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{AddressConfig, Config, GeneralConfig, ServiceConfig};
