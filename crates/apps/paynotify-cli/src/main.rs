//! paynotify binary entry point.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use paynotify_cli::{output::format_error, run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            if let Some(output) = e.output() {
                println!("{}", output);
            }
            eprintln!("{}", format_error(&e));
            std::process::exit(e.exit_code());
        }
    }
}

/// Logs go to stderr. `--verbose` adds `paynotify=debug`; `RUST_LOG` wins
/// otherwise, defaulting to `info`.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let filter = if verbose {
        match "paynotify=debug".parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    } else {
        filter
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
