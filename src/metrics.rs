//! # Derived Metrics
//!
//! Cross-spot quantities computed once over the decoded, time-ordered spot
//! sequence:
//!
//! - vertical speed from consecutive altitudes
//! - ground speed from consecutive good fixes, gated on its uncertainty
//! - sun elevation at the spot position
//! - receiver statistics over the valid slots

use std::collections::BTreeSet;

use tracing::debug;

use crate::geo::geodesy::{greatcircle, greatcircle_km};
use crate::geo::locator::locator_to_coords;
use crate::geo::sun::SunPosition;
use crate::spot::Spot;

/// Computed speeds above this are always rejected
const MAX_SPEED_KPH: f64 = 350.0;

/// Computed speeds in `0..=SANE_SPEED_KPH` are accepted whatever their band
const SANE_SPEED_KPH: f64 = 300.0;

/// Locator precision levels used for computed speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixPrecision {
    /// Six-character locator
    Subsquare,
    /// Eight-character locator
    Extended,
}

impl FixPrecision {
    /// Precision shared by two locators (the coarser of the two)
    pub fn common(a: &str, b: &str) -> Option<Self> {
        match a.len().min(b.len()) {
            n if n >= 8 => Some(FixPrecision::Extended),
            n if n >= 6 => Some(FixPrecision::Subsquare),
            _ => None,
        }
    }

    /// Number of locator characters used at this precision
    pub fn chars(self) -> usize {
        match self {
            FixPrecision::Subsquare => 6,
            FixPrecision::Extended => 8,
        }
    }

    /// Distance tolerance in km
    fn tolerance_km(self) -> f64 {
        match self {
            FixPrecision::Subsquare => 4.0,
            FixPrecision::Extended => 0.2,
        }
    }

    /// Widest acceptable speed uncertainty band in kph
    fn max_band_kph(self) -> f64 {
        match self {
            FixPrecision::Subsquare => 50.0,
            FixPrecision::Extended => 20.0,
        }
    }
}

/// Accept or reject a speed derived from two fixes
///
/// # Arguments
///
/// * `distance_km` - Distance between the fixes
/// * `elapsed_s` - Time between the fixes
/// * `precision` - Locator precision the distance was computed at
///
/// # Returns
///
/// * `Option<f64>` - Speed in kph if it passes the gate
pub fn gate_speed(distance_km: f64, elapsed_s: f64, precision: FixPrecision) -> Option<f64> {
    if elapsed_s <= 0.0 {
        return None;
    }

    let speed = distance_km * 3600.0 / elapsed_s;
    if speed > MAX_SPEED_KPH {
        return None;
    }

    let tolerance = precision.tolerance_km();
    let low = (distance_km - tolerance).max(0.0) * 3600.0 / elapsed_s;
    let high = (distance_km + tolerance) * 3600.0 / elapsed_s;

    if high - low <= precision.max_band_kph() || (0.0..=SANE_SPEED_KPH).contains(&speed) {
        Some(speed)
    } else {
        None
    }
}

/// Whether a spot can anchor a computed speed
fn is_good_fix(spot: &Spot, sats_channel: Option<usize>) -> bool {
    if spot.locator.len() < 6 || spot.coords().is_none() {
        return false;
    }
    match sats_channel.and_then(|i| spot.decoded_et.get(i).copied().flatten()) {
        Some(sats) => sats != 0.0,
        None => true,
    }
}

fn computed_speed(last: &Spot, spot: &Spot) -> Option<f64> {
    let precision = FixPrecision::common(&last.locator, &spot.locator)?;
    let (lat0, lon0) = locator_to_coords(last.locator.get(..precision.chars())?)?;
    let (lat1, lon1) = locator_to_coords(spot.locator.get(..precision.chars())?)?;

    let distance_km = greatcircle_km(lat0, lon0, lat1, lon1);
    let elapsed_s = (spot.timestamp - last.timestamp).num_seconds() as f64;
    gate_speed(distance_km, elapsed_s, precision)
}

fn vertical_speed(previous: &Spot, spot: &Spot) -> Option<f64> {
    let minutes = (spot.timestamp - previous.timestamp).num_seconds() as f64 / 60.0;
    if minutes <= 0.0 {
        return None;
    }
    Some((spot.altitude_m? - previous.altitude_m?) / minutes)
}

fn receiver_statistics(spot: &mut Spot) {
    let receivers: Vec<_> = (0..spot.slots.len())
        .filter_map(|i| spot.slot(i))
        .flat_map(|report| report.receivers.iter())
        .collect();

    let callsigns: BTreeSet<&str> = receivers.iter().map(|r| r.callsign.as_str()).collect();
    let locators: BTreeSet<&str> = receivers.iter().map(|r| r.locator.as_str()).collect();

    let max_distance = spot.coords().and_then(|(lat, lon)| {
        locators
            .iter()
            .filter_map(|locator| locator_to_coords(locator))
            .map(|(rx_lat, rx_lon)| greatcircle(lat, lon, rx_lat, rx_lon))
            .reduce(f64::max)
    });

    let receiver_count = callsigns.len();
    let max_snr_db = receivers.iter().map(|r| r.snr_db).max();

    spot.receiver_count = receiver_count;
    spot.max_receiver_distance_m = max_distance;
    spot.max_snr_db = max_snr_db;
}

/// Compute cross-spot quantities
///
/// # Arguments
///
/// * `spots` - Decoded spots in time order
/// * `sats_channel` - Position of the satellite count channel, if any
/// * `sun` - Sun position provider
///
/// # Returns
///
/// * `Vec<Spot>` - The same spots with derived fields set
pub fn derive(mut spots: Vec<Spot>, sats_channel: Option<usize>, sun: &dyn SunPosition) -> Vec<Spot> {
    let mut last_altitude: Option<usize> = None;
    let mut last_fix: Option<usize> = None;

    for i in 0..spots.len() {
        if let Some(previous) = last_altitude {
            spots[i].vertical_speed_m_per_min = vertical_speed(&spots[previous], &spots[i]);
        }
        if spots[i].altitude_m.is_some() {
            last_altitude = Some(i);
        }

        if is_good_fix(&spots[i], sats_channel) {
            match last_fix {
                None => last_fix = Some(i),
                Some(previous) => match computed_speed(&spots[previous], &spots[i]) {
                    Some(speed) => {
                        spots[i].computed_speed_kph = Some(speed);
                        last_fix = Some(i);
                    }
                    None => debug!("Rejected computed speed at {}", spots[i].timestamp),
                },
            }
        }

        let spot = &mut spots[i];
        spot.sun_elevation_deg = spot
            .coords()
            .map(|(lat, lon)| sun.elevation_deg(spot.timestamp, lat, lon));
        receiver_statistics(spot);
    }

    spots
}
