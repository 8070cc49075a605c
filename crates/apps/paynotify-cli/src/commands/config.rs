//! Print or write the effective configuration.

use std::path::Path;

use colored::Colorize;

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::OutputFormat;

/// Execute the config command.
pub fn config(
    config: CliConfig,
    format: OutputFormat,
    path: &Path,
    write: bool,
) -> CliResult<String> {
    if write {
        config.save(path)?;
    }

    let body = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&config)?,
        OutputFormat::Human => {
            let mut text = config.to_toml()?;
            if write {
                text.push_str(&format!("\n{} {}", "Wrote".green(), path.display()));
            }
            text
        }
    };
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueKind;
    use tempfile::TempDir;

    #[test]
    fn test_config_write_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("paynotify.toml");
        let mut cfg = CliConfig::default();
        cfg.queue.backend = QueueKind::Durable;
        cfg.worker.concurrency = 8;

        config(cfg, OutputFormat::Human, &path, true).unwrap();

        let loaded = CliConfig::load(&path).unwrap();
        assert_eq!(loaded.queue.backend, QueueKind::Durable);
        assert_eq!(loaded.worker.concurrency, 8);
    }

    #[test]
    fn test_config_print_does_not_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("paynotify.toml");

        let out = config(CliConfig::default(), OutputFormat::Json, &path, false).unwrap();
        assert!(!path.exists());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["queue"]["backend"], "in_process");
    }
}
