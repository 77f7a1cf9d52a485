//! Command-line interface definitions for stunnel-launcher.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Launch stunnel from a typed TOML description of its services.
///
/// The configuration is turned into a stunnel config file in a private
/// temporary directory, stunnel is started against it, and the command
/// returns control once stunnel reports that the configuration is applied.
#[derive(Parser, Debug)]
#[command(name = "stunnel-launcher")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// What to do.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to additional config file.
    ///
    /// Merged on top of the system and user configs.
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the stunnel binary (overrides `general.binary`).
    #[arg(long = "binary", value_name = "PATH", global = true)]
    pub binary: Option<PathBuf>,

    /// Directory for temporary stunnel files (overrides `general.app_dir`).
    #[arg(long = "app-dir", value_name = "DIR", global = true)]
    pub app_dir: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level (includes stunnel's own output)
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for stunnel-launcher.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the stunnel config that would be generated, without launching.
    Render,

    /// Start stunnel and wait until it exits.
    Run,

    /// Print the version banner of the configured stunnel binary.
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from([
            "stunnel-launcher",
            "-vv",
            "--config",
            "/etc/tunnels.toml",
            "run",
            "--binary",
            "/opt/stunnel",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Run));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/tunnels.toml")));
        assert_eq!(cli.binary, Some(PathBuf::from("/opt/stunnel")));
        assert!(cli.app_dir.is_none());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["stunnel-launcher"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
