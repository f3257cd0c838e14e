//! Event Relay
//!
//! Moves event records from the source search store into the destination
//! document store, enriching each with an annotated image and alerting
//! responders after each committed batch.
//!
//! # Usage
//!
//! ```bash
//! event-relay continuous [--interval SECS]
//! event-relay single [--minutes-back N] [--query JSON] [--limit N]
//! event-relay full-sync [--limit N]
//! event-relay health-check
//! event-relay --config-check
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/event-relay/config.toml)
//! 3. Environment variables (RELAY_*)
//! 4. CLI flags

use anyhow::{bail, Result};
use clap::Parser;

use relay_daemon::{
    init_tracing, print_config, run_cleanup_tokens, run_continuous, run_full_sync,
    run_health_check, run_single, Cli, Commands,
};
use relay_types::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;

    if cli.config_check {
        print_config(&settings);
        return Ok(());
    }

    init_tracing(&settings, cli.log_level.as_deref());

    match cli.command {
        Some(Commands::Continuous { interval }) => {
            run_continuous(settings, interval).await?;
        }
        Some(Commands::Single {
            minutes_back,
            query,
            limit,
        }) => {
            run_single(settings, minutes_back, query, limit).await?;
        }
        Some(Commands::FullSync { limit }) => {
            run_full_sync(settings, limit).await?;
        }
        Some(Commands::HealthCheck) => {
            run_health_check(settings).await?;
        }
        Some(Commands::CleanupTokens) => {
            run_cleanup_tokens(settings).await?;
        }
        None => {
            bail!("no command given; see --help");
        }
    }

    Ok(())
}
