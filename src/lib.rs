//! # WSPR Telemetry Library
//!
//! Reconstructs balloon and tracker telemetry from WSPR beacon reports.
//!
//! Trackers spread one telemetry update over up to five two-minute slots.
//! This library merges fetched reports, matches them into transmission
//! sequences, decodes the tracker protocol, interprets user-programmed
//! extended telemetry and derives cross-spot metrics such as computed speed.

pub mod channel;
pub mod config;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod spot;
pub mod telemetry;
