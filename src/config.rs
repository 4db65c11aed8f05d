//! Configuration management
//!
//! An [`ExportConfig`] is assembled once at startup from built-in defaults,
//! an optional JSON file, the environment and command-line flags, then passed
//! by reference to the fetcher and the writer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::timestamp::{self, now_millis};
use crate::types::{Interval, OutputFormat, Symbol};

pub const DEFAULT_BASE_URL: &str = "https://api3.binance.com";
pub const DEFAULT_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_INTERVAL: Interval = Interval::OneDay;
pub const DEFAULT_LIMIT: u32 = 500;
pub const DEFAULT_OUTPUT_DIR: &str = "./data";

/// Upper bound the exchange enforces on `limit`
pub const MAX_LIMIT: u32 = 1000;

/// Environment variable overriding the REST base URL
pub const BASE_URL_ENV: &str = "BINANCE_API_URL";

/// Errors raised while building or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown interval '{0}' (expected one of 1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d, 3d, 1w, 1M)")]
    UnknownInterval(String),

    #[error("unknown output format '{0}' (expected json or csv)")]
    UnknownFormat(String),

    #[error("invalid date '{0}' (expected YYYY_MM_DD)")]
    InvalidDate(String),

    #[error("limit must be between 1 and {max}, got {limit}")]
    LimitOutOfRange { limit: u32, max: u32 },

    #[error("start time ({start}) must be before end time ({end})")]
    InvertedRange { start: i64, end: i64 },

    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("base URL must not be empty")]
    EmptyBaseUrl,
}

/// Immutable parameters of one export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub symbol: Symbol,
    pub interval: Interval,
    /// Maximum klines per request
    pub limit: u32,
    /// Epoch ms; `None` lets the exchange start at the earliest kline
    pub start_time: Option<i64>,
    /// Epoch ms
    pub end_time: i64,
    pub output_dir: PathBuf,
    pub base_url: String,
    pub format: OutputFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            symbol: Symbol::new(DEFAULT_SYMBOL),
            interval: DEFAULT_INTERVAL,
            limit: DEFAULT_LIMIT,
            start_time: None,
            end_time: now_millis(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            base_url: DEFAULT_BASE_URL.to_string(),
            format: OutputFormat::default(),
        }
    }
}

impl ExportConfig {
    /// Layer `overrides` on top of this config. Dates are parsed here.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(symbol) = &overrides.symbol {
            self.symbol = Symbol::new(symbol);
        }
        if let Some(interval) = overrides.interval {
            self.interval = interval;
        }
        if let Some(limit) = overrides.limit {
            self.limit = limit;
        }
        if let Some(start) = &overrides.start_date {
            self.start_time = Some(timestamp::parse_date_arg(start)?);
        }
        if let Some(end) = &overrides.end_date {
            self.end_time = timestamp::parse_date_arg(end)?;
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(url) = &overrides.base_url {
            self.base_url = url.trim().to_string();
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        Ok(self)
    }

    /// Check invariants the exchange would otherwise reject
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(ConfigError::LimitOutOfRange {
                limit: self.limit,
                max: MAX_LIMIT,
            });
        }
        if let Some(start) = self.start_time {
            if start >= self.end_time {
                return Err(ConfigError::InvertedRange {
                    start,
                    end: self.end_time,
                });
            }
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        Ok(())
    }
}

/// Partial configuration, as read from a JSON file or collected from flags.
///
/// Every field is optional; unset fields leave the underlying value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// `YYYY_MM_DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// `YYYY_MM_DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
}

impl ConfigOverrides {
    /// Load overrides from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let overrides: ConfigOverrides =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(overrides)
    }

    /// Overrides taken from the process environment
    pub fn from_env() -> Self {
        ConfigOverrides {
            base_url: std::env::var(BASE_URL_ENV).ok().filter(|v| !v.trim().is_empty()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::parse_date_arg;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.symbol.as_str(), "BTCUSDT");
        assert_eq!(config.interval, Interval::OneDay);
        assert_eq!(config.limit, 500);
        assert_eq!(config.start_time, None);
        assert_eq!(config.output_dir, PathBuf::from("./data"));
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_apply_in_place() {
        let overrides = ConfigOverrides {
            symbol: Some("ethusdt".to_string()),
            interval: Some(Interval::OneHour),
            limit: Some(10),
            start_date: Some("2018_01_15".to_string()),
            end_date: Some("2018_01_16".to_string()),
            output_dir: Some(PathBuf::from("./data/eth_usdt")),
            ..Default::default()
        };

        let config = ExportConfig::default().with_overrides(&overrides).unwrap();

        assert_eq!(config.symbol.as_str(), "ETHUSDT");
        assert_eq!(config.interval, Interval::OneHour);
        assert_eq!(config.limit, 10);
        assert_eq!(config.start_time, Some(parse_date_arg("2018_01_15").unwrap()));
        assert_eq!(config.end_time, parse_date_arg("2018_01_16").unwrap());
        assert_eq!(config.output_dir, PathBuf::from("./data/eth_usdt"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let base = ExportConfig::default();
        let config = base.clone().with_overrides(&ConfigOverrides::default()).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_bad_date_override() {
        let overrides = ConfigOverrides {
            start_date: Some("15/01/2018".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ExportConfig::default().with_overrides(&overrides),
            Err(ConfigError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_validate_limit_bounds() {
        let mut config = ExportConfig::default();

        config.limit = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LimitOutOfRange { limit: 0, .. })
        ));

        config.limit = MAX_LIMIT + 1;
        assert!(config.validate().is_err());

        config.limit = MAX_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_inverted_range() {
        let config = ExportConfig {
            start_time: Some(2_000),
            end_time: 1_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange { start: 2_000, end: 1_000 })
        ));
    }

    #[test]
    fn test_validate_empty_fields() {
        let config = ExportConfig {
            symbol: Symbol::new("  "),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptySymbol)));

        let config = ExportConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyBaseUrl)));
    }

    #[test]
    fn test_overrides_from_json() {
        let json = r#"{
            "symbol": "BNBUSDT",
            "interval": "4h",
            "limit": 1000,
            "format": "csv",
            "base_url": "https://api.binance.com"
        }"#;
        let overrides: ConfigOverrides = serde_json::from_str(json).unwrap();

        assert_eq!(overrides.symbol.as_deref(), Some("BNBUSDT"));
        assert_eq!(overrides.interval, Some(Interval::FourHours));
        assert_eq!(overrides.limit, Some(1000));
        assert_eq!(overrides.format, Some(OutputFormat::Csv));
        assert_eq!(overrides.start_date, None);
    }

    #[test]
    fn test_overrides_reject_unknown_keys() {
        let json = r#"{ "pair": "BTCUSDT" }"#;
        assert!(serde_json::from_str::<ConfigOverrides>(json).is_err());
    }

    #[test]
    fn test_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        fs::write(&path, r#"{ "interval": "1w", "output_dir": "out" }"#).unwrap();

        let overrides = ConfigOverrides::from_file(&path).unwrap();
        assert_eq!(overrides.interval, Some(Interval::OneWeek));
        assert_eq!(overrides.output_dir, Some(PathBuf::from("out")));

        assert!(ConfigOverrides::from_file(dir.path().join("missing.json")).is_err());
    }
}
