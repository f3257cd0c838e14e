//! CLI argument parsing for the relay daemon.

use clap::{Parser, Subcommand};

/// Event Relay
///
/// Moves event records from the source search store into the destination
/// document store, enriching each record with an annotated image and
/// alerting responders after each committed batch.
#[derive(Parser, Debug)]
#[command(name = "event-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/event-relay/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Print the resolved configuration and exit
    #[arg(long, global = true)]
    pub config_check: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Execution modes
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline continuously at the configured interval
    Continuous {
        /// Override the polling interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run one recent-window pass and exit
    Single {
        /// Lookback window in minutes
        #[arg(short, long)]
        minutes_back: Option<i64>,

        /// Custom source filter predicate as a JSON string
        #[arg(short, long)]
        query: Option<String>,

        /// Cap the number of records processed
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Relay every record in the source collection and exit
    FullSync {
        /// Cap the number of records processed
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check connectivity of all collaborators and exit
    HealthCheck,

    /// Clear responders previously flagged with invalid tokens
    CleanupTokens,
}
