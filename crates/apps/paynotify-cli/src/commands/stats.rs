//! Gateway statistics for a wallet.

use paynotify_settle::parse_address;

use crate::config::CliConfig;
use crate::context::{build_client, build_ledger};
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Render, StatsOutput};

/// Execute the stats command.
///
/// Without an address, reports on the configured paying wallet.
pub async fn stats(
    config: CliConfig,
    format: OutputFormat,
    address: Option<String>,
) -> CliResult<String> {
    let ledger = build_ledger(&config)?;
    let client = build_client(&config, ledger)?;

    let address = match address {
        Some(address) => parse_address(&address)
            .map_err(|_| CliError::user(format!("not a wallet address: {:?}", address)))?,
        None => config.ledger_config()?.payer_address()?,
    };
    let address = format!("{:#x}", address);

    let stats = client.stats(&address).await?;
    Ok(StatsOutput { address, stats }.render(format))
}
