//! Subcommand handling for stunnel-launcher.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::Commands;
use crate::config::Config;
use crate::stunnel::{Readiness, StunnelBuilder, stunnel_version};

/// Run `command` against a loaded configuration.
pub fn handle_command(command: &Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Render => render(config),
        Commands::Run => run(config),
        Commands::Version => version(config),
    }
}

/// Build the stunnel builder described by `config`, with its workspace under
/// `app_dir`.
fn builder(config: &Config, app_dir: &Path) -> Result<StunnelBuilder> {
    if config.services.is_empty() {
        bail!("No services configured. Add at least one [[services]] entry.");
    }

    let mut builder = StunnelBuilder::new(config.general.binary(), app_dir);
    config
        .apply_to(&mut builder)
        .context("Failed to prepare stunnel services")?;
    Ok(builder)
}

/// Config text `run` would hand to stunnel, without the byte-order mark.
///
/// PSK secrets files are written to a scratch directory that is deleted
/// before this returns, so `PSKsecrets` paths in the output are placeholders.
/// The configured app directory is never touched.
pub fn render_config(config: &Config) -> Result<String> {
    let scratch = tempfile::Builder::new()
        .prefix("stunnel-launcher-render-")
        .tempdir()
        .context("Failed to create scratch directory")?;
    let builder = builder(config, scratch.path())?;
    Ok(builder.config_content())
}

fn render(config: &Config) -> Result<()> {
    print!("{}", render_config(config)?);
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    let app_dir = config
        .general
        .app_dir()
        .context("Failed to determine app directory")?;
    let mut stunnel = builder(config, &app_dir)?
        .start()
        .context("Failed to start stunnel")?;

    match stunnel.readiness() {
        Some(Readiness::Ready) => info!(
            "stunnel is running with {} service(s) (PID {:?})",
            config.services.len(),
            stunnel.pid()
        ),
        _ => warn!("stunnel stopped logging before reporting readiness"),
    }

    let status = stunnel.wait().context("Failed to wait for stunnel")?;
    match status {
        Some(status) if status.success() => Ok(()),
        Some(status) => bail!("stunnel exited with {}", status),
        None => Ok(()),
    }
}

fn version(config: &Config) -> Result<()> {
    let binary = config.general.binary();
    match stunnel_version(&binary) {
        Some(banner) => {
            println!("{}", banner);
            Ok(())
        }
        None => bail!(
            "Could not run {:?}. Install stunnel or pass --binary.",
            binary
        ),
    }
}
