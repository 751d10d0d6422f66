//! # Protocol Decoders
//!
//! Turns a matched [`SlotGroup`] into a [`Spot`] carrying the physical
//! fields of its tracker protocol. One decode function per tracker type,
//! selected once per spot from the resolved channel code.
//!
//! Per-slot failures mark that slot invalid and keep the spot. A missing
//! slot the protocol cannot do without discards the spot.

use tracing::debug;

use super::payload::extract_report;
use super::{SlotGroup, Spot, TrackerParams, SLOT_COUNT};
use crate::channel::TrackerType;
use crate::report::Report;

/// Zachtek altitude per dBm of slot-0 power
const ZACHTEK_COARSE_ALTITUDE_M: f64 = 300.0;

/// Zachtek altitude per dBm of slot-1 power
const ZACHTEK_FINE_ALTITUDE_M: f64 = 20.0;

/// WB8ELK altitude per slot-0 power rank
const WB8ELK_COARSE_ALTITUDE_M: f64 = 1000.0;

/// WB8ELK altitude per slot-1 power rank
const WB8ELK_FINE_ALTITUDE_M: f64 = 60.0;

/// WB8ELK voltage for letter `A`
const WB8ELK_BASE_VOLTAGE_V: f64 = 3.3;

/// Decode a slot group
///
/// # Arguments
///
/// * `group` - Matched slots
/// * `params` - Tracker parameters
///
/// # Returns
///
/// * `Option<Spot>` - Decoded spot, or `None` if the protocol requires a
///   slot the group does not have
pub fn decode(group: SlotGroup, params: &TrackerParams) -> Option<Spot> {
    match params.channel.tracker {
        TrackerType::Unknown | TrackerType::GenericSingle => Some(Spot::from_group(group)),
        TrackerType::ZachtekSingle => {
            let mut spot = Spot::from_group(group);
            spot.altitude_m = spot
                .base()
                .map(|base| base.power as f64 * ZACHTEK_COARSE_ALTITUDE_M);
            Some(spot)
        }
        TrackerType::GenericDual | TrackerType::ZachtekDual => decode_dual(group, params),
        TrackerType::Wb8elk => Some(decode_wb8elk(group)),
        TrackerType::U4b => Some(decode_u4b(group, params)),
    }
}

/// Base locator truncated to the four-character square
fn square(locator: &str) -> Option<&str> {
    locator.get(..4).filter(|s| s.len() == 4)
}

fn decode_dual(group: SlotGroup, params: &TrackerParams) -> Option<Spot> {
    // Slot 0's own position is unreliable: the pair is only trusted together
    let Some(companion) = group.slot(1).cloned() else {
        debug!("Discarding spot at {}: slot 1 missing", group.timestamp());
        return None;
    };

    let mut spot = Spot::from_group(group);
    spot.set_locator(companion.locator.clone());

    if params.channel.tracker == TrackerType::ZachtekDual {
        spot.altitude_m = spot.base().map(|base| {
            base.power as f64 * ZACHTEK_COARSE_ALTITUDE_M
                + companion.power as f64 * ZACHTEK_FINE_ALTITUDE_M
        });
    }

    Some(spot)
}

fn decode_wb8elk(group: SlotGroup) -> Spot {
    let mut spot = Spot::from_group(group);

    let base_rank = spot.base().and_then(Report::power_index);
    spot.altitude_m = base_rank.map(|rank| rank as f64 * WB8ELK_COARSE_ALTITUDE_M);

    let Some(companion) = spot.slot(1).cloned() else {
        return spot;
    };

    let cs = companion.callsign.as_bytes();
    if cs.len() != 6 {
        debug!("WB8ELK slot 1 {} is not a telemetry callsign", companion.callsign);
        spot.invalidate(1);
        return spot;
    }

    if let (Some(altitude), Some(rank)) = (spot.altitude_m, companion.power_index()) {
        spot.altitude_m = Some(altitude + rank as f64 * WB8ELK_FINE_ALTITUDE_M);
    }

    let subsquare_letters = cs[4..6]
        .iter()
        .all(|c| (b'A'..=b'X').contains(&c.to_ascii_uppercase()));
    let same_square = match (square(&companion.locator), square(&spot.locator)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if subsquare_letters && same_square {
        let locator = format!(
            "{}{}",
            &spot.locator[..4],
            companion.callsign[4..6].to_ascii_lowercase()
        );
        spot.set_locator(locator);
    }

    if cs[3].is_ascii_uppercase() {
        spot.voltage_v = Some(WB8ELK_BASE_VOLTAGE_V + (cs[3] - b'A') as f64 * 0.1);
    }

    spot
}

fn decode_u4b(group: SlotGroup, params: &TrackerParams) -> Spot {
    let mut spot = Spot::from_group(group);

    if let Some(companion) = spot.slot(1).cloned() {
        match extract_report(&companion) {
            None => {
                debug!("Slot 1 {} carries no payload", companion.callsign);
                spot.invalidate(1);
            }
            Some(payload) if payload.is_basic() => {
                match payload.basic(params.legacy_voltage_offset) {
                    Some(basic) if basic.gps_valid => {
                        if let Some(base_square) = square(&spot.locator).map(str::to_string) {
                            spot.set_locator(base_square + &basic.locator_suffix);
                        }
                        spot.altitude_m = Some(basic.altitude_m);
                        spot.speed_kph = Some(basic.speed_kph);
                        spot.voltage_v = Some(basic.voltage_v);
                        spot.temperature_c = Some(basic.temperature_c);
                    }
                    _ => {
                        debug!("Slot 1 {} has no valid GPS fix", companion.callsign);
                        spot.invalidate(1);
                    }
                }
            }
            Some(payload) => spot.raw_et[1] = Some(payload.et_value()),
        }
    }

    for index in 2..SLOT_COUNT {
        let Some(report) = spot.slot(index) else {
            continue;
        };

        match extract_report(report) {
            Some(payload) if !payload.is_basic() => spot.raw_et[index] = Some(payload.et_value()),
            _ => {
                debug!("Slot {} {} is not extended telemetry", index, report.callsign);
                spot.invalidate(index);
                break;
            }
        }
    }

    spot
}
