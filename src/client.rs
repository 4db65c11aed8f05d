//! Binance REST client for historical klines
//!
//! The fetcher only sees the [`KlineSource`] trait, so the pagination loop can
//! be driven by the HTTP client in production and by scripted pages in tests.

use reqwest::blocking::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ExportConfig;
use crate::types::RawKline;

pub const KLINES_ENDPOINT: &str = "/api/v3/klines";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Failure of a single page request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to decode kline page: {0}")]
    Decode(#[source] reqwest::Error),
}

impl FetchError {
    /// HTTP status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport(_) | FetchError::Decode(_) => None,
        }
    }
}

/// Query parameters of one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub symbol: String,
    pub interval: String,
    pub limit: u32,
    pub start_time: Option<i64>,
    pub end_time: i64,
}

impl PageRequest {
    /// First request of a run; `start_time` comes straight from the config
    pub fn first(config: &ExportConfig) -> Self {
        PageRequest {
            symbol: config.symbol.as_str().to_string(),
            interval: config.interval.as_str().to_string(),
            limit: config.limit,
            start_time: config.start_time,
            end_time: config.end_time,
        }
    }

    /// Same request with the start cursor moved
    pub fn starting_at(&self, start_time: i64) -> Self {
        PageRequest {
            start_time: Some(start_time),
            ..self.clone()
        }
    }

    /// Query string pairs; `startTime` is omitted when unset
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("symbol", self.symbol.clone()),
            ("interval", self.interval.clone()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(start) = self.start_time {
            pairs.push(("startTime", start.to_string()));
        }
        pairs.push(("endTime", self.end_time.to_string()));
        pairs
    }
}

/// Anything that can answer a kline page request
pub trait KlineSource {
    fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawKline>, FetchError>;
}

impl<S: KlineSource + ?Sized> KlineSource for &S {
    fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawKline>, FetchError> {
        (**self).fetch_page(request)
    }
}

/// Blocking HTTP client for the public market-data API
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    endpoint: String,
}

impl BinanceClient {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), KLINES_ENDPOINT),
        })
    }

    /// Full URL of the klines endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl KlineSource for BinanceClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawKline>, FetchError> {
        debug!(endpoint = %self.endpoint, start_time = ?request.start_time, "GET klines");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&request.query_pairs())
            .send()
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response.json().map_err(FetchError::Decode)
    }
}
