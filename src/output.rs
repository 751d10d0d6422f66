//! # Spot Output
//!
//! Writes decoded spots as JSON Lines (one spot per line). Each record is the
//! serialized [`Spot`] plus:
//!
//! - `telemetry`: channel label to value formatted with its resolution
//! - `channels`: one entry per decoded channel with its position, labels and unit
//!
//! The whole file is rewritten after each reprocessing, since reprocessing
//! may change earlier spots.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::spot::Spot;
use crate::telemetry::EtSpec;

/// One output line
#[derive(Debug, Serialize)]
struct SpotRecord<'a> {
    #[serde(flatten)]
    spot: &'a Spot,
    telemetry: BTreeMap<String, String>,
    channels: Vec<ChannelRecord>,
}

/// A decoded extended telemetry channel
#[derive(Debug, Serialize)]
struct ChannelRecord {
    index: usize,
    label: String,
    long_label: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    unit: String,
    value: f64,
    formatted: String,
}

fn decoded_channels(spot: &Spot, et: &EtSpec) -> Vec<ChannelRecord> {
    spot.decoded_et
        .iter()
        .enumerate()
        .filter_map(|(index, value)| {
            value.map(|value| ChannelRecord {
                index,
                label: et.label(index),
                long_label: et.long_label(index),
                unit: et.unit(index).to_string(),
                value,
                formatted: et.format_value(index, value),
            })
        })
        .collect()
}

/// Serialize spots as JSON Lines
///
/// # Returns
///
/// * `Result<String>` - One JSON object per line, newline terminated
///
/// # Errors
///
/// Returns error if a spot fails to serialize
pub fn to_jsonl(spots: &[Spot], et: &EtSpec) -> Result<String> {
    let mut out = String::new();
    for spot in spots {
        let channels = decoded_channels(spot, et);
        let record = SpotRecord {
            spot,
            telemetry: channels
                .iter()
                .map(|c| (c.label.clone(), c.formatted.clone()))
                .collect(),
            channels,
        };
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Replace the output file with the given spots
///
/// # Errors
///
/// Returns error if serialization or the file write fails
pub async fn write_spots<P: AsRef<Path>>(path: P, spots: &[Spot], et: &EtSpec) -> Result<()> {
    let contents = to_jsonl(spots, et)?;
    tokio::fs::write(path.as_ref(), contents).await?;
    debug!("Wrote {} spots to {}", spots.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::{at, report};
    use crate::spot::SlotGroup;

    fn spot() -> Spot {
        let mut spot = Spot::from_group(SlotGroup::new(report(at(12, 4), "N0CALL", "FN20", 37)));
        spot.altitude_m = Some(10_680.0);
        spot.decoded_et = vec![Some(1234.4), None, Some(-12.34)];
        spot
    }

    fn et() -> EtSpec {
        EtSpec::compile(
            "_10:0:1,10:0:1,10:0:1",
            "Alt,,Temp",
            "Altitude,,",
            "m,,C",
            "0,,1",
        )
        .unwrap()
    }

    #[test]
    fn test_jsonl_one_line_per_spot() {
        let out = to_jsonl(&[spot(), spot()], &et()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_record_fields() {
        let out = to_jsonl(&[spot()], &et()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();

        assert_eq!(value["locator"], "FN20");
        assert_eq!(value["altitude_m"], 10_680.0);
        assert_eq!(value["speed_kph"], serde_json::Value::Null);
        assert_eq!(value["slots"][0]["state"], "valid");
        assert_eq!(value["slots"][0]["report"]["callsign"], "N0CALL");
        assert_eq!(value["slots"][1]["state"], "empty");
        assert_eq!(value["telemetry"]["Alt"], "1234");
        assert_eq!(value["telemetry"]["Temp"], "-12.3");
        assert!(value["telemetry"].get("ET1").is_none());
    }

    #[test]
    fn test_channels_carry_long_labels_and_units() {
        let out = to_jsonl(&[spot()], &et()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        let channels = value["channels"].as_array().unwrap();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0]["index"], 0);
        assert_eq!(channels[0]["label"], "Alt");
        assert_eq!(channels[0]["long_label"], "Altitude");
        assert_eq!(channels[0]["unit"], "m");
        assert_eq!(channels[0]["value"], 1234.4);
        assert_eq!(channels[0]["formatted"], "1234");

        assert_eq!(channels[1]["index"], 2);
        assert_eq!(channels[1]["long_label"], "Temp");
        assert_eq!(channels[1]["unit"], "C");
    }

    #[test]
    fn test_unit_omitted_when_unset() {
        let et = EtSpec::parse("_10:0:1").unwrap();
        let mut spot = spot();
        spot.decoded_et = vec![Some(4.0)];

        let out = to_jsonl(&[spot], &et).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["channels"][0]["label"], "ET0");
        assert!(value["channels"][0].get("unit").is_none());
    }

    #[tokio::test]
    async fn test_write_spots_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spots.jsonl");

        write_spots(&path, &[spot(), spot()], &et()).await.unwrap();
        write_spots(&path, &[spot()], &et()).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
