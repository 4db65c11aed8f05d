//! Export command implementation

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use kline_exporter::client::BinanceClient;
use kline_exporter::config::{ConfigOverrides, ExportConfig};
use kline_exporter::export::{export_records, AlwaysOverwrite, ExportOutcome, OverwritePrompt};
use kline_exporter::fetcher::fetch_all_with;
use kline_exporter::timestamp::{format_datetime, format_millis, DATE_ARG_FORMAT};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Asks on the terminal before replacing an existing export
struct TerminalPrompt;

impl OverwritePrompt for TerminalPrompt {
    fn confirm_overwrite(&mut self, path: &Path) -> io::Result<bool> {
        print!(
            "WARNING: The file {} already exists. Do you want to overwrite it? [y/n] ",
            path.display()
        );
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(is_yes(&answer))
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

pub fn run(
    config_file: Option<PathBuf>,
    cli_overrides: ConfigOverrides,
    assume_yes: bool,
) -> Result<()> {
    let config = build_config(config_file.as_deref(), &cli_overrides)?;

    info!(
        "Exporting {} {} klines (limit {}) from {} to {}",
        config.symbol,
        config.interval,
        config.limit,
        config
            .start_time
            .and_then(|t| format_millis(t, DATE_ARG_FORMAT))
            .unwrap_or_else(|| "earliest".to_string()),
        format_millis(config.end_time, DATE_ARG_FORMAT).unwrap_or_else(|| config.end_time.to_string())
    );

    let client = BinanceClient::new(&config.base_url).context("Failed to build HTTP client")?;
    info!("START: Requesting data from: {}", client.endpoint());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = fetch_all_with(&client, &config, |progress| {
        spinner.set_message(format!(
            "page {} ({} klines so far, next from {})",
            progress.page,
            progress.total,
            format_datetime(progress.next_start).unwrap_or_default()
        ));
    });
    spinner.finish_and_clear();
    let report = report.context("Failed to fetch klines")?;

    debug!(requests = report.requests, "pagination finished");
    if let Some(err) = &report.halted_by {
        warn!(
            "Stopped early after {} requests: {} (keeping {} klines)",
            report.requests,
            err,
            report.records.len()
        );
    }

    if report.is_empty() {
        println!("No data found");
        return Ok(());
    }

    println!("{}", "=".repeat(41));
    println!(" Retrieved {} data points", report.records.len());
    println!("{}", "=".repeat(41));

    let mut prompt: Box<dyn OverwritePrompt> = if assume_yes {
        Box::new(AlwaysOverwrite)
    } else {
        Box::new(TerminalPrompt)
    };
    let outcome = export_records(&report.records, &config, prompt.as_mut())
        .context("Failed to export klines")?;

    match outcome {
        ExportOutcome::Written { path, records } => {
            println!("\n> END: Data exported to {}", path.display());
            info!("Wrote {} klines to {}", records, path.display());
        }
        ExportOutcome::Skipped { path } => {
            info!("Export skipped, {} left untouched", path.display());
        }
    }

    Ok(())
}

/// Defaults, then config file, then environment, then command-line flags
fn build_config(config_file: Option<&Path>, cli_overrides: &ConfigOverrides) -> Result<ExportConfig> {
    let mut config = ExportConfig::default();

    if let Some(path) = config_file {
        let file_overrides = ConfigOverrides::from_file(path)?;
        info!("Loaded configuration from: {}", path.display());
        config = config
            .with_overrides(&file_overrides)
            .with_context(|| format!("Invalid value in {}", path.display()))?;
    }

    config = config
        .with_overrides(&ConfigOverrides::from_env())
        .context("Invalid value in environment")?
        .with_overrides(cli_overrides)
        .context("Invalid command-line argument")?;

    config.validate().context("Invalid export configuration")?;
    Ok(config)
}
