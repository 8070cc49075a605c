//! Command-line interface and job API for paynotify.
//!
//! This crate provides the `paynotify` binary:
//!
//! - **Service**: `serve` runs the HTTP job API (and workers); `worker` runs
//!   extra workers against the durable queue
//! - **Delivery**: `notify` pays and delivers immediately; `enqueue` and
//!   `poll` go through the job API
//! - **Subscribers**: `subscribe`, `unsubscribe`, `users`
//! - **Info**: `stats`, `config`
//!
//! # Quick Start
//!
//! ```bash
//! export PAYNOTIFY_WALLET_KEY=0x...
//! paynotify subscribe alice 123456789
//! paynotify serve &
//! paynotify enqueue alice "build finished" --wait
//! ```
//!
//! # Output Formats
//!
//! All commands support `--format human|json`.
//!
//! # Configuration
//!
//! Loaded from `paynotify.toml` in the data directory. Override with
//! `--config` or `PAYNOTIFY_CONFIG`.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod output;
pub mod remote;
pub mod signals;

// Re-export main types
pub use cli::{Cli, Commands, OutputFormatArg};
pub use config::CliConfig;
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, Render};

use config::default_config_path;

/// Load configuration and dispatch `cli.command`, returning what to print.
pub async fn run(cli: Cli) -> CliResult<String> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = CliConfig::load(&config_path)?;
    let format: OutputFormat = cli.format.into();

    match cli.command {
        // Service commands
        Commands::Serve { no_workers } => commands::serve(config, format, no_workers).await,

        Commands::Worker { concurrency } => commands::worker(config, format, concurrency).await,

        // Delivery commands
        Commands::Notify {
            destinations,
            message,
            proof,
        } => commands::notify(config, format, destinations, &message, proof).await,

        Commands::Enqueue {
            user_id,
            message,
            wait,
        } => commands::enqueue(config, format, &user_id, &message, wait).await,

        Commands::Poll { job_id, timeout } => {
            commands::poll(config, format, &job_id, timeout).await
        }

        // Subscriber commands
        Commands::Subscribe {
            user_id,
            destination,
        } => commands::subscribe(config, format, &user_id, &destination).await,

        Commands::Unsubscribe { user_id } => commands::unsubscribe(config, format, &user_id).await,

        Commands::Users => commands::users(config, format).await,

        // Info commands
        Commands::Stats { address } => commands::stats(config, format, address).await,

        Commands::Config { write } => commands::config(config, format, &config_path, write),
    }
}
