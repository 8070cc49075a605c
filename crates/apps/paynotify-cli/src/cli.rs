//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Pay-per-message notification pipeline.
#[derive(Parser, Debug)]
#[command(name = "paynotify")]
#[command(author = "paynotify contributors")]
#[command(version)]
#[command(about = "Send notifications through an x402 payment-gated gateway")]
#[command(
    long_about = "paynotify pays a notification gateway on demand and tracks each delivery as a job.\n\nRun 'paynotify serve' to start the job API and workers."
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "PAYNOTIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (human or json).
    #[arg(short, long, global = true, default_value = "human")]
    pub format: OutputFormatArg,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format argument for clap.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormatArg {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // =========================================================================
    // Service Commands
    // =========================================================================
    /// Run the job API.
    ///
    /// Also runs the worker pool unless --no-workers is given.
    Serve {
        /// Do not run workers in this process (durable queue only).
        #[arg(long)]
        no_workers: bool,
    },

    /// Run workers against the durable queue.
    Worker {
        /// Override worker.concurrency.
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
    },

    // =========================================================================
    // Delivery Commands
    // =========================================================================
    /// Deliver a message now, paying if the gateway asks.
    ///
    /// With several destinations the deliveries run concurrently and each
    /// pays on its own.
    Notify {
        /// Destination chat ids.
        #[arg(required = true)]
        destinations: Vec<String>,

        /// Message text.
        #[arg(short, long)]
        message: String,

        /// Reuse an existing payment transaction instead of paying.
        #[arg(long)]
        proof: Option<String>,
    },

    /// Queue a message for a subscriber through the job API.
    Enqueue {
        /// Subscriber id.
        user_id: String,

        /// Message text.
        message: String,

        /// Wait for the job to finish.
        #[arg(short, long)]
        wait: bool,
    },

    /// Follow a job until it finishes.
    Poll {
        /// Job id.
        job_id: String,

        /// Give up after this many seconds (default from config).
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    // =========================================================================
    // Subscriber Commands
    // =========================================================================
    /// Register or update a subscriber's destination.
    Subscribe {
        /// Subscriber id.
        user_id: String,
        /// Destination chat id.
        destination: String,
    },

    /// Remove a subscriber.
    Unsubscribe {
        /// Subscriber id.
        user_id: String,
    },

    /// List subscribers.
    Users,

    // =========================================================================
    // Info Commands
    // =========================================================================
    /// Show gateway statistics for a wallet.
    Stats {
        /// Wallet address (default: the configured paying wallet).
        address: Option<String>,
    },

    /// Print the effective configuration.
    Config {
        /// Write it to the config path as well.
        #[arg(long)]
        write: bool,
    },
}
