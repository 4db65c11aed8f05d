//! Kline exporter
//!
//! Pages through the Binance `/api/v3/klines` endpoint for one symbol and
//! interval, normalizes every kline, and writes the result to a file named
//! after the symbol, date range and interval.
//!
//! The pipeline is configuration → [`fetcher`] → [`normalize`] → [`export`].

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod normalize;
pub mod timestamp;
pub mod types;

pub use client::{BinanceClient, FetchError, KlineSource, PageRequest};
pub use config::{ConfigError, ConfigOverrides, ExportConfig};
pub use error::{ExportError, ExportResult};
pub use export::{export_records, AlwaysOverwrite, ExportOutcome, OverwritePrompt};
pub use fetcher::{fetch_all, fetch_all_with, FetchReport, KlinePages, PageProgress};
pub use types::*;
