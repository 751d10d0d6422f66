//! # Extended Telemetry Interpreter
//!
//! Evaluates a compiled [`EtSpec`] against the packed values a spot carries.
//!
//! A single output cursor runs over the populated slots in slot order. For
//! each slot the decoders are tried in order: a decoder that does not match
//! moves the cursor past its channels, leaving them empty, and the first
//! decoder that matches writes its channels at the cursor. So a slot decoded
//! by decoder `d` lands at the same positions in every spot, and a second
//! slot matching a decoder already used appends after the first one instead
//! of replacing it.

use chrono::{DateTime, Timelike, Utc};
use tracing::debug;

use super::spec::{Decoder, EtSpec, Expected, Filter, LOCATOR_LABEL};
use crate::spot::Spot;

/// Index tested by time filters: minutes since midnight / 2
fn time_index(timestamp: DateTime<Utc>) -> u64 {
    (timestamp.hour() as u64 * 60 + timestamp.minute() as u64) / 2
}

fn passes(filter: &Filter, time: u64, slot: usize, raw: u64) -> bool {
    match *filter {
        Filter::Time {
            divisor,
            modulus,
            expected,
        } => (time / divisor) % modulus == expected,
        Filter::Slot(expected) => slot == expected,
        Filter::Value {
            divisor,
            modulus,
            expected,
        } => {
            let value = (raw / divisor) % modulus;
            match expected {
                Expected::Value(expected) => value == expected,
                Expected::CurrentSlot => value == slot as u64,
            }
        }
    }
}

fn extract(decoder: &Decoder, raw: u64) -> impl Iterator<Item = f64> + '_ {
    decoder
        .extractors
        .iter()
        .map(move |e| e.offset + ((raw / e.divisor) % e.modulus) as f64 * e.scale)
}

/// Decode a spot's extended telemetry
///
/// # Arguments
///
/// * `spec` - Compiled program
/// * `spot` - Spot from the protocol decoder
///
/// # Returns
///
/// * `Spot` - The spot with `decoded_et` filled and, when a `Loc` channel
///   decoded, an eight-character locator
pub fn interpret(spec: &EtSpec, mut spot: Spot) -> Spot {
    if spec.is_empty() || spot.raw_et.iter().all(Option::is_none) {
        return spot;
    }

    let time = time_index(spot.timestamp);
    let mut decoded: Vec<Option<f64>> = Vec::with_capacity(spec.channel_count());
    let mut cursor = 0;

    for (slot, raw) in spot.raw_et.iter().enumerate() {
        let Some(raw) = *raw else {
            continue;
        };

        let mut matched = false;
        for decoder in spec.decoders() {
            if !decoder.filters.iter().all(|f| passes(f, time, slot, raw)) {
                cursor += decoder.extractors.len();
                continue;
            }

            if decoded.len() < cursor {
                decoded.resize(cursor, None);
            }
            decoded.extend(extract(decoder, raw).map(Some));
            cursor = decoded.len();
            matched = true;
            break;
        }

        if !matched {
            debug!("No extended telemetry decoder matches slot {} at {}", slot, spot.timestamp);
        }
    }

    if decoded.len() < cursor.max(spec.channel_count()) {
        decoded.resize(cursor.max(spec.channel_count()), None);
    }

    spot.decoded_et = decoded;
    apply_enhanced_locator(spec, &mut spot);
    spot
}

/// Append the two digits of a decoded `Loc` channel to a six-character locator
fn apply_enhanced_locator(spec: &EtSpec, spot: &mut Spot) {
    let Some(value) = spec
        .channel_index(LOCATOR_LABEL)
        .and_then(|i| spot.decoded_et.get(i).copied().flatten())
    else {
        return;
    };

    if value.fract() != 0.0 || !(0.0..=99.0).contains(&value) {
        debug!("Locator extension {} out of range", value);
        return;
    }

    if let Some(prefix) = spot.locator.get(..6).filter(|p| p.len() == 6) {
        let locator = format!("{}{:02}", prefix, value as u8);
        spot.set_locator(locator);
    }
}
