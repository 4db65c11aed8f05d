//! Error types for the fetch → normalize → export pipeline

use thiserror::Error;

use crate::client::FetchError;

#[derive(Debug, Error)]
pub enum ExportError {
    /// A page request failed; the fetch loop stops on this
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed kline record: {0}")]
    MalformedRecord(String),

    #[error("no data found")]
    NoData,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;
