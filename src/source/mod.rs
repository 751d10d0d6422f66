//! # Report Sources
//!
//! Acquisition of report batches for a query window.
//!
//! This module handles:
//! - Validating the query window (date parsing, ordering, range limit)
//! - Reading batches in the ingest wire shape from a file
//! - Feeding fetched batches into a [`Tracker`]
//!
//! Sources do not retry. A failed fetch is returned to the caller, which
//! decides whether to try again on the next poll.

pub mod source_trait;

pub use source_trait::ReportSource;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use crate::error::{Result, WsprError};
use crate::pipeline::Tracker;
use crate::report::wire::{parse_batch, parse_timestamp, DATE_FORMAT};
use crate::report::Report;

/// Default longest query range in days
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 31;

/// Time range of reports to fetch (both ends inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    /// Open-ended when `None`
    pub end: Option<DateTime<Utc>>,
}

/// Parse an end bound; a bare date means the end of that day
fn parse_end(text: &str) -> Result<DateTime<Utc>> {
    match NaiveDate::parse_from_str(text.trim(), DATE_FORMAT) {
        Ok(date) => {
            let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
            Ok(date.and_time(last_second).and_utc())
        }
        Err(_) => parse_timestamp(text),
    }
}

impl QueryWindow {
    /// Create a validated window
    ///
    /// # Arguments
    ///
    /// * `start` - First instant
    /// * `end` - Last instant, or `None` for open-ended
    /// * `max_range_days` - Longest allowed range
    /// * `now` - Current time, closing an open-ended range for the range check
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidDate` if `end` precedes `start` or the
    /// range is longer than `max_range_days`
    pub fn new(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        max_range_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let effective_end = end.unwrap_or(now);
        if effective_end < start {
            return Err(WsprError::InvalidDate(format!(
                "end {} is before start {}",
                effective_end, start
            )));
        }
        if effective_end - start > Duration::days(max_range_days as i64) {
            return Err(WsprError::InvalidDate(format!(
                "range {} to {} exceeds {} days",
                start, effective_end, max_range_days
            )));
        }
        Ok(Self { start, end })
    }

    /// Create a validated window from text bounds
    ///
    /// `start` and `end` accept `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`. An
    /// empty `end` leaves the window open.
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidDate` if a bound does not parse or the
    /// window is invalid
    pub fn parse(start: &str, end: &str, max_range_days: u32, now: DateTime<Utc>) -> Result<Self> {
        if start.trim().is_empty() {
            return Err(WsprError::InvalidDate("start date is required".to_string()));
        }
        let start = parse_timestamp(start)?;
        let end = match end.trim() {
            "" => None,
            text => Some(parse_end(text)?),
        };
        Self::new(start, end, max_range_days, now)
    }

    /// Whether `timestamp` falls inside the window
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && self.end.map_or(true, |end| timestamp <= end)
    }
}

/// Source reading a JSON batch file in the ingest wire shape
///
/// The file is re-read on every fetch, so an external process can keep
/// appending rows to it.
#[derive(Debug, Clone)]
pub struct FileReportSource {
    path: PathBuf,
}

impl FileReportSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportSource for FileReportSource {
    async fn fetch(&mut self, window: &QueryWindow) -> Result<Vec<Report>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let batch = parse_batch(&contents)?;
        let total = batch.len();

        let reports: Vec<Report> = batch
            .into_iter()
            .filter(|report| window.contains(report.timestamp))
            .collect();

        debug!(
            "Read {} reports from {} ({} inside the query window)",
            total,
            self.path.display(),
            reports.len()
        );
        Ok(reports)
    }
}

/// Fetch one batch and merge it into the tracker
///
/// # Returns
///
/// * `Result<usize>` - Number of reports not seen before
///
/// # Errors
///
/// Returns the source's error; the tracker is left untouched
pub async fn poll(
    source: &mut dyn ReportSource,
    window: &QueryWindow,
    tracker: &mut Tracker,
) -> Result<usize> {
    let batch = source.fetch(window).await?;
    let new_count = tracker.ingest(&batch);
    info!(
        "Fetched {} reports, {} new",
        batch.len(),
        new_count
    );
    Ok(new_count)
}
