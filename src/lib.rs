//! stunnel-launcher: typed stunnel configuration and process supervision
//!
//! This crate describes stunnel TLS proxy services with typed builders, writes
//! them to a private stunnel config file and runs stunnel against it, blocking
//! until stunnel reports that the configuration is applied.
//!
//! # Architecture
//!
//! - **Stunnel**: value formatting, config builders, PSK secrets files,
//!   temporary workspaces and the process supervisor
//! - **Config**: hierarchical TOML configuration for the binary
//! - **CLI**: argument parsing and subcommand dispatch

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod cli_handler;
pub mod config;
pub mod stunnel;
