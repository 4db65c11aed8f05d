//! kline-exporter - main entry point
//!
//! Downloads the full kline history of one trading pair from the Binance REST
//! API and writes it to a JSON (or CSV) file.

use anyhow::Result;
use clap::Parser;
use kline_exporter::config::ConfigOverrides;
use kline_exporter::{Interval, OutputFormat};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;

const AFTER_HELP: &str = "\
ATTENTION: Make sure to not exceed the number of requests allowed by the API when configuring the `limit` and `interval` parameters.

NOTE: if you don't specify a start time for your request, it will use the earliest available data for the requested time interval.
Checkout the Binance API documentation for more information: https://binance-docs.github.io/apidocs/spot/en/

Example: kline-exporter -l 10 -i 1h -p ETHUSDT -s 2018_01_15 -e 2018_01_16 -o ./data/eth_usdt/";

#[derive(Parser, Debug)]
#[command(name = "kline-exporter")]
#[command(about = "Export the historical kline data of a Binance symbol to JSON", long_about = None)]
#[command(version, after_help = AFTER_HELP)]
struct Cli {
    /// The interval of the data: 1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d, 3d, 1w, 1M [default: 1d]
    #[arg(short, long)]
    interval: Option<Interval>,

    /// The pair of coin, e.g. BTCUSDT, ETHUSDT (refer to the Binance symbol list) [default: BTCUSDT]
    #[arg(short, long)]
    pair: Option<String>,

    /// The limit of the data per request, 1..=1000 [default: 500]
    #[arg(short, long)]
    limit: Option<u32>,

    /// The start time of the data (YYYY_MM_DD) [default: earliest available]
    #[arg(short, long = "start-time", alias = "start_time")]
    start_time: Option<String>,

    /// The end time of the data (YYYY_MM_DD) [default: now]
    #[arg(short, long = "end-time", alias = "end_time")]
    end_time: Option<String>,

    /// The folder where the data will be exported [default: ./data]
    #[arg(short, long = "output-folder", alias = "output_folder")]
    output_folder: Option<PathBuf>,

    /// Output file format: json or csv [default: json]
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// REST base URL (overrides BINANCE_API_URL) [default: https://api3.binance.com]
    #[arg(long)]
    base_url: Option<String>,

    /// JSON file with default values for any of the options above
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overwrite an existing export file without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Also write logs to a timestamped file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            symbol: self.pair.clone(),
            interval: self.interval,
            limit: self.limit,
            start_date: self.start_time.clone(),
            end_date: self.end_time.clone(),
            output_dir: self.output_folder.clone(),
            base_url: self.base_url.clone(),
            format: self.format,
        }
    }
}

fn setup_logging(verbose: bool, log_dir: Option<&Path>) -> Result<()> {
    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(verbose)
        .with_line_number(verbose)
        .with_file(verbose)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    // File layer - same events without ANSI colors
    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let log_filename = format!(
                "export_{}.log",
                chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
            );
            let file_appender = tracing_appender::rolling::never(dir, &log_filename);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .with_ansi(false);
            (Some(layer.boxed()), Some(dir.join(log_filename)))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_path {
        info!("Log file: {}", path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Pick up BINANCE_API_URL from a local .env, if any
    dotenv::dotenv().ok();

    setup_logging(cli.verbose, cli.log_dir.as_deref())?;

    let overrides = cli.overrides();
    commands::export::run(cli.config, overrides, cli.yes)
}
