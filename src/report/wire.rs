//! # Ingest Wire Shape
//!
//! Parses report batches delivered by the external data source. Each row is
//! a JSON array:
//!
//! ```text
//! ["2024-05-01 12:04:00", "N0CALL", "FN20", 37, [["K1ABC", "FN42", 14097050, -20], ...]]
//! ```
//!
//! A batch that is not an array of rows fails as a whole. Rows with an
//! invalid field (timestamp, locator, power level) are skipped and logged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use super::{power_index, Receiver, Report};
use crate::error::{Result, WsprError};
use crate::geo::locator::is_valid_locator;

/// Timestamp format of the wire shape
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date-only format accepted for query bounds
pub const DATE_FORMAT: &str = "%Y-%m-%d";

type WireReceiver = (String, String, i64, i32);
type WireRow = (String, String, String, i32, Vec<WireReceiver>);

/// Parse a UTC timestamp in `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD` form
///
/// # Errors
///
/// Returns `WsprError::InvalidDate` if neither form matches
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(text, DATE_FORMAT).map(|date| date.and_time(Default::default()))
        })
        .map(|naive| naive.and_utc())
        .map_err(|e| WsprError::InvalidDate(format!("'{}': {}", text, e)))
}

fn parse_row(row: WireRow) -> Result<Report> {
    let (timestamp, callsign, locator, power, receivers) = row;

    let timestamp = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
        .map_err(|e| WsprError::InvalidReport(format!("timestamp '{}': {}", timestamp, e)))?
        .and_utc();

    if callsign.is_empty() {
        return Err(WsprError::InvalidReport(format!(
            "empty callsign at {}",
            timestamp
        )));
    }

    let locator = locator.to_ascii_uppercase();
    if !matches!(locator.len(), 0 | 4 | 6) || !is_valid_locator(&locator) {
        return Err(WsprError::InvalidReport(format!(
            "locator '{}' of {} at {}",
            locator, callsign, timestamp
        )));
    }

    if power_index(power).is_none() {
        return Err(WsprError::InvalidReport(format!(
            "power {} dBm of {} at {} is not a WSPR power level",
            power, callsign, timestamp
        )));
    }

    let receivers = receivers
        .into_iter()
        .map(|(callsign, locator, frequency_hz, snr_db)| Receiver {
            callsign: callsign.to_ascii_uppercase(),
            locator: locator.to_ascii_uppercase(),
            frequency_hz,
            snr_db,
        })
        .collect();

    Ok(Report::new(
        timestamp,
        callsign.to_ascii_uppercase(),
        locator,
        power,
        receivers,
    ))
}

/// Sort a batch by (timestamp, callsign), keeping the first row per key
pub fn sort_batch(mut reports: Vec<Report>) -> Vec<Report> {
    reports.sort_by(|a, b| a.key().cmp(&b.key()));
    reports.dedup_by(|later, earlier| {
        let duplicate = later.key() == earlier.key();
        if duplicate {
            debug!(
                "Dropping duplicate report {} at {}",
                later.callsign, later.timestamp
            );
        }
        duplicate
    });
    reports
}

/// Parse a JSON batch in the ingest wire shape
///
/// # Arguments
///
/// * `json` - JSON array of rows
///
/// # Returns
///
/// * `Result<Vec<Report>>` - Reports sorted by (timestamp, callsign)
///
/// # Errors
///
/// Returns error if the JSON does not have the row shape
pub fn parse_batch(json: &str) -> Result<Vec<Report>> {
    let rows: Vec<WireRow> = serde_json::from_str(json)?;
    let total = rows.len();
    let reports: Vec<Report> = rows
        .into_iter()
        .filter_map(|row| match parse_row(row) {
            Ok(report) => Some(report),
            Err(e) => {
                debug!("Skipping report row: {}", e);
                None
            }
        })
        .collect();

    if reports.len() < total {
        debug!("Skipped {} of {} report rows", total - reports.len(), total);
    }
    Ok(sort_batch(reports))
}
