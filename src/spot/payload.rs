//! # U4B Payload Codec
//!
//! Default-protocol telemetry hides its payload in fields that look like an
//! ordinary WSPR message. Two integers are recovered:
//!
//! - `m` from callsign characters 2, 4, 5, 6 (char 2 base 36, the rest base 26)
//! - `n` from locator characters 1-4 (base 18, 18, 10, 10) and the power
//!   level rank (base 19)
//!
//! The lowest bit of `n` tells basic telemetry (odd) from extended
//! telemetry (even).
//!
//! ## Basic Telemetry Layout
//!
//! | Field | Source | Range |
//! |-------|--------|-------|
//! | Grid chars 5-6 | `m / 1068` | 24 × 24 |
//! | Altitude | `m % 1068` | × 20 m |
//! | GPS valid | `(n / 2) % 2` | bit |
//! | Speed | `(n / 4) % 42` | × 2 knots |
//! | Voltage | `(n / 168) % 40` | rotated by 20, × 0.05 V + 3 V |
//! | Temperature | `(n / 6720) % 90` | − 50 °C |

use crate::report::{power_index, Report};

/// Number of distinct `n` values (18 × 18 × 10 × 10 × 19)
pub const N_RANGE: u64 = 615_600;

/// Altitude steps per grid subsquare in `m`
const ALTITUDE_STEPS: u64 = 1068;

/// Altitude resolution in meters
const ALTITUDE_STEP_M: f64 = 20.0;

/// Knots to km/h
const KNOTS_TO_KPH: f64 = 1.852;

/// Voltage subtracted when the legacy offset is enabled
const LEGACY_VOLTAGE_OFFSET_V: f64 = 2.0;

/// Integers recovered from a telemetry message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub m: u64,
    pub n: u64,
}

/// Physical values of a basic telemetry message
#[derive(Debug, Clone, PartialEq)]
pub struct BasicTelemetry {
    /// Lower-case grid characters 5-6
    pub locator_suffix: String,
    pub altitude_m: f64,
    pub gps_valid: bool,
    pub speed_kph: f64,
    pub voltage_v: f64,
    pub temperature_c: f64,
}

/// Digit or letter as 0-35
fn alnum_value(c: u8) -> Option<u64> {
    match c.to_ascii_uppercase() {
        d @ b'0'..=b'9' => Some((d - b'0') as u64),
        l @ b'A'..=b'Z' => Some((l - b'A') as u64 + 10),
        _ => None,
    }
}

/// Letter as 0-25
fn letter_value(c: u8) -> Option<u64> {
    match c.to_ascii_uppercase() {
        l @ b'A'..=b'Z' => Some((l - b'A') as u64),
        _ => None,
    }
}

/// Letter in `A`-`R` as 0-17
fn field_value(c: u8) -> Option<u64> {
    letter_value(c).filter(|&v| v < 18)
}

fn digit_value(c: u8) -> Option<u64> {
    c.is_ascii_digit().then(|| (c - b'0') as u64)
}

/// Recover `m` and `n` from raw message fields
///
/// # Arguments
///
/// * `callsign` - Six-character telemetry callsign
/// * `locator` - Locator (only the first four characters are used)
/// * `power` - Power in dBm
///
/// # Returns
///
/// * `Option<Payload>` - `None` if any field is outside the telemetry alphabet
pub fn extract(callsign: &str, locator: &str, power: i32) -> Option<Payload> {
    let cs = callsign.as_bytes();
    let loc = locator.as_bytes();
    if cs.len() != 6 || loc.len() < 4 {
        return None;
    }

    let m = ((alnum_value(cs[1])? * 26 + letter_value(cs[3])?) * 26 + letter_value(cs[4])?) * 26
        + letter_value(cs[5])?;

    let n = (((field_value(loc[0])? * 18 + field_value(loc[1])?) * 10 + digit_value(loc[2])?)
        * 10
        + digit_value(loc[3])?)
        * 19
        + power_index(power)? as u64;

    Some(Payload { m, n })
}

/// Recover `m` and `n` from a report
pub fn extract_report(report: &Report) -> Option<Payload> {
    extract(&report.callsign, &report.locator, report.power)
}

impl Payload {
    /// Odd `n` marks basic telemetry
    pub fn is_basic(&self) -> bool {
        self.n % 2 == 1
    }

    /// Packed extended telemetry value (the parity bit removed)
    pub fn et_value(&self) -> u64 {
        (self.m * N_RANGE + self.n) / 2
    }

    /// Decode basic telemetry fields
    ///
    /// # Arguments
    ///
    /// * `legacy_voltage_offset` - Subtract 2 V from the voltage
    ///
    /// # Returns
    ///
    /// * `Option<BasicTelemetry>` - `None` for extended telemetry messages or
    ///   a grid suffix outside `aa`-`xx`
    pub fn basic(&self, legacy_voltage_offset: bool) -> Option<BasicTelemetry> {
        if !self.is_basic() {
            return None;
        }

        let subsquare = self.m / ALTITUDE_STEPS;
        if subsquare >= 24 * 24 {
            return None;
        }
        let locator_suffix: String = [subsquare / 24, subsquare % 24]
            .iter()
            .map(|&v| (b'a' + v as u8) as char)
            .collect();

        let n = self.n;
        let mut voltage_v = ((n / 168 + 20) % 40) as f64 * 0.05 + 3.0;
        if legacy_voltage_offset {
            voltage_v -= LEGACY_VOLTAGE_OFFSET_V;
        }

        Some(BasicTelemetry {
            locator_suffix,
            altitude_m: (self.m % ALTITUDE_STEPS) as f64 * ALTITUDE_STEP_M,
            gps_valid: (n / 2) % 2 == 1,
            speed_kph: ((n / 4) % 42) as f64 * 2.0 * KNOTS_TO_KPH,
            voltage_v,
            temperature_c: ((n / 6720) % 90) as f64 - 50.0,
        })
    }
}
