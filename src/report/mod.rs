//! # Beacon Reports
//!
//! One decoded reception record per (timestamp, transmitter callsign), with
//! the set of receivers that heard it.
//!
//! This module handles:
//! - Report and receiver types
//! - The table of legal WSPR power levels
//! - Parsing the ingest wire shape (`wire`)
//! - Merging report batches (`merge`)

pub mod merge;
pub mod wire;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

/// Legal WSPR power levels in dBm, ascending
pub const POWER_LEVELS: [i32; 19] = [
    0, 3, 7, 10, 13, 17, 20, 23, 27, 30, 33, 37, 40, 43, 47, 50, 53, 57, 60,
];

/// Rank (0-18) of a power level in [`POWER_LEVELS`]
///
/// # Returns
///
/// * `Option<usize>` - Rank, or `None` if `power` is not a legal level
pub fn power_index(power: i32) -> Option<usize> {
    POWER_LEVELS.iter().position(|&p| p == power)
}

/// One station that heard a report
///
/// Field order makes the derived ordering sort by receiver callsign first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Receiver {
    /// Receiver callsign
    pub callsign: String,

    /// Receiver locator (4 or 6 characters, may be empty)
    pub locator: String,

    /// Reported frequency in Hz
    pub frequency_hz: i64,

    /// Reported SNR in dB
    pub snr_db: i32,
}

/// One decoded beacon reception record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Transmission start (UTC, minute resolution)
    pub timestamp: DateTime<Utc>,

    /// Transmitted callsign
    pub callsign: String,

    /// Transmitted locator (4 or 6 characters, may be empty)
    pub locator: String,

    /// Transmitted power in dBm
    pub power: i32,

    /// Distinct receivers, sorted by callsign
    pub receivers: Vec<Receiver>,
}

impl Report {
    /// Create a report, sorting and deduplicating its receivers
    pub fn new(
        timestamp: DateTime<Utc>,
        callsign: impl Into<String>,
        locator: impl Into<String>,
        power: i32,
        mut receivers: Vec<Receiver>,
    ) -> Self {
        receivers.sort();
        receivers.dedup();

        Self {
            timestamp,
            callsign: callsign.into(),
            locator: locator.into(),
            power,
            receivers,
        }
    }

    /// Identity key used for ordering and merging
    pub fn key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp, &self.callsign)
    }

    /// Minute of the hour of the transmission
    pub fn minute(&self) -> u32 {
        self.timestamp.minute()
    }

    /// Rank of the transmitted power level
    pub fn power_index(&self) -> Option<usize> {
        power_index(self.power)
    }
}
