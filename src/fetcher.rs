//! Paginated kline retrieval
//!
//! [`KlinePages`] lazily walks the endpoint one page at a time, moving the
//! start cursor one millisecond past the last kline it saw. It stops after the
//! first empty page or the first failed request. [`fetch_all`] flattens the
//! pages into normalized records.

use tracing::{debug, info, warn};

use crate::client::{FetchError, KlineSource, PageRequest};
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::normalize::normalize;
use crate::timestamp::format_datetime;
use crate::types::{KlineRecord, RawKline};

/// Lazy sequence of non-empty kline pages
pub struct KlinePages<S> {
    source: S,
    request: PageRequest,
    requests: usize,
    finished: bool,
}

impl<S: KlineSource> KlinePages<S> {
    pub fn new(source: S, config: &ExportConfig) -> Self {
        KlinePages {
            source,
            request: PageRequest::first(config),
            requests: 0,
            finished: false,
        }
    }

    /// Requests issued so far
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Parameters the next request will use
    pub fn next_request(&self) -> &PageRequest {
        &self.request
    }
}

impl<S: KlineSource> Iterator for KlinePages<S> {
    type Item = ExportResult<Vec<RawKline>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.requests += 1;
        let page = match self.source.fetch_page(&self.request) {
            Ok(page) => page,
            Err(err) => {
                self.finished = true;
                return Some(Err(err.into()));
            }
        };

        let Some(last) = page.last() else {
            debug!(requests = self.requests, "empty page, end of data");
            self.finished = true;
            return None;
        };

        match last.open_time().and_then(|t| t.checked_add(1)) {
            Some(next_start) => {
                self.request = self.request.starting_at(next_start);
                Some(Ok(page))
            }
            None => {
                self.finished = true;
                Some(Err(ExportError::MalformedRecord(format!(
                    "last kline of page {} has no usable open time",
                    self.requests
                ))))
            }
        }
    }
}

/// Progress after each page, for callers that want to report it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// 1-based page number
    pub page: usize,
    pub received: usize,
    pub total: usize,
    /// Start cursor of the next request
    pub next_start: i64,
}

/// Outcome of a full pagination run
#[derive(Debug)]
pub struct FetchReport {
    /// Normalized records, ascending by open time
    pub records: Vec<KlineRecord>,
    /// Requests issued, including the final empty or failed one
    pub requests: usize,
    /// Request failure that stopped the loop, if it did not end on an empty page
    pub halted_by: Option<FetchError>,
}

impl FetchReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fetch every kline in the configured range
pub fn fetch_all<S: KlineSource>(source: S, config: &ExportConfig) -> ExportResult<FetchReport> {
    fetch_all_with(source, config, |_| {})
}

/// Fetch every kline in the configured range, calling `on_page` after each page.
///
/// A failed request ends the loop but keeps what was already collected; only
/// malformed klines abort the run.
pub fn fetch_all_with<S, F>(
    source: S,
    config: &ExportConfig,
    mut on_page: F,
) -> ExportResult<FetchReport>
where
    S: KlineSource,
    F: FnMut(&PageProgress),
{
    let mut pages = KlinePages::new(source, config);
    let mut records: Vec<KlineRecord> = Vec::new();
    let mut halted_by = None;
    let mut page_no = 0;

    for page in pages.by_ref() {
        let page = match page {
            Ok(page) => page,
            Err(ExportError::Fetch(err)) => {
                warn!(page = page_no + 1, "Request failed, stopping: {}", err);
                halted_by = Some(err);
                break;
            }
            Err(err) => return Err(err),
        };

        page_no += 1;
        records.reserve(page.len());
        for raw in &page {
            records.push(normalize(raw)?);
        }

        // normalize succeeded, so the last record exists and carries the cursor
        let next_start = records.last().map_or(0, |r| r.open_time.saturating_add(1));
        debug!(page = page_no, received = page.len(), total = records.len(), "page fetched");
        info!(
            "Requesting data from {}",
            format_datetime(next_start).unwrap_or_else(|| next_start.to_string())
        );

        on_page(&PageProgress {
            page: page_no,
            received: page.len(),
            total: records.len(),
            next_start,
        });
    }

    Ok(FetchReport {
        records,
        requests: pages.requests(),
        halted_by,
    })
}
