//! # Slot Matcher
//!
//! Groups a (timestamp, callsign)-ordered report stream into transmission
//! sequences. A report's slot follows from its minute relative to the
//! channel's slot-0 minute; companions attach to the most recent open group
//! when the protocol's attachment rule accepts them.
//!
//! ## Attachment Rules
//!
//! | Tracker | Rule |
//! |---------|------|
//! | generic / Zachtek dual | always |
//! | WB8ELK | same locator as slot 0 |
//! | U4B | a receiver heard an earlier slot within 5 Hz; for slots 2-4, an extended telemetry payload as fallback |
//!
//! The U4B fallback attaches on timing alone and can misattribute telemetry
//! when several trackers share a channel.

use chrono::Duration;
use tracing::debug;

use super::payload::extract_report;
use super::{SlotGroup, TrackerParams};
use crate::channel::TrackerType;
use crate::report::Report;

/// Maximum frequency difference for co-receiver correlation in Hz
pub const CO_RECEIVER_TOLERANCE_HZ: i64 = 5;

/// Companions must start within this many minutes of slot 0
const SEQUENCE_WINDOW_MIN: i64 = 10;

/// Slot index of a report for a channel whose slot 0 is on `base_minute`
pub fn slot_index(minute: u32, base_minute: u32) -> usize {
    ((minute as i64 - base_minute as i64 + 10).rem_euclid(10) / 2) as usize
}

/// Whether two reports share a receiver at nearly the same frequency
fn co_received(a: &Report, b: &Report) -> bool {
    a.receivers.iter().any(|ra| {
        b.receivers.iter().any(|rb| {
            ra.callsign == rb.callsign
                && (ra.frequency_hz - rb.frequency_hz).abs() <= CO_RECEIVER_TOLERANCE_HZ
        })
    })
}

fn carries_channel_id(report: &Report, params: &TrackerParams) -> bool {
    match params.channel.telemetry_id() {
        Some((id1, id3)) => {
            let cs = report.callsign.as_bytes();
            cs.len() == 6
                && cs[0].eq_ignore_ascii_case(&(id1 as u8))
                && cs[2] == id3 as u8
        }
        None => true,
    }
}

fn accepts(group: &SlotGroup, slot: usize, candidate: &Report, params: &TrackerParams) -> bool {
    match params.channel.tracker {
        TrackerType::GenericDual | TrackerType::ZachtekDual => true,
        TrackerType::Wb8elk => candidate
            .locator
            .eq_ignore_ascii_case(&group.base().locator),
        TrackerType::U4b => {
            if !carries_channel_id(candidate, params) {
                return false;
            }

            let correlated = group
                .reports()
                .take_while(|&(index, _)| index < slot)
                .any(|(_, earlier)| co_received(earlier, candidate));
            if correlated {
                return true;
            }

            let parity_matched = slot >= 2
                && candidate.callsign.len() == 6
                && extract_report(candidate).map_or(false, |payload| !payload.is_basic());
            if parity_matched {
                debug!(
                    "Attaching {} to slot {} of {} on timing alone",
                    candidate.callsign,
                    slot,
                    group.timestamp()
                );
            }
            parity_matched
        }
        TrackerType::Unknown | TrackerType::GenericSingle | TrackerType::ZachtekSingle => false,
    }
}

/// Group reports into transmission sequences
///
/// # Arguments
///
/// * `reports` - Reports ordered by (timestamp, callsign)
/// * `params` - Tracker parameters
///
/// # Returns
///
/// * `Vec<SlotGroup>` - Groups in timestamp order; reports that neither
///   start nor join a group are left out
pub fn match_slots(reports: &[Report], params: &TrackerParams) -> Vec<SlotGroup> {
    if params.channel.tracker == TrackerType::Unknown {
        return reports.iter().cloned().map(SlotGroup::new).collect();
    }

    let base_minute = params.channel.slot_minute(0);
    let max_slot = params.channel.max_slot();
    let window = Duration::minutes(SEQUENCE_WINDOW_MIN);
    let mut groups: Vec<SlotGroup> = Vec::new();

    for report in reports {
        let slot = slot_index(report.minute(), base_minute);
        if slot > max_slot {
            continue;
        }

        if slot == 0 {
            if let Some(callsign) = &params.callsign {
                if !report.callsign.eq_ignore_ascii_case(callsign) {
                    continue;
                }
            }

            match groups.last() {
                Some(open) if open.timestamp() == report.timestamp => {
                    debug!(
                        "Ignoring second slot-0 report {} at {}",
                        report.callsign, report.timestamp
                    );
                }
                _ => groups.push(SlotGroup::new(report.clone())),
            }
            continue;
        }

        let Some(open) = groups.last_mut() else {
            continue;
        };

        let elapsed = report.timestamp - open.timestamp();
        if elapsed < Duration::zero() || elapsed >= window || !open.is_free(slot) {
            continue;
        }

        if accepts(open, slot, report, params) {
            open.attach(slot, report.clone());
        } else {
            debug!(
                "Unmatched slot {} report {} at {}",
                slot, report.callsign, report.timestamp
            );
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelCode;
    use crate::report::fixtures::{at, report, rx};
    use crate::report::Receiver;

    fn params(code: &str) -> TrackerParams {
        TrackerParams::new(ChannelCode::resolve(code, "20m").unwrap())
    }

    fn heard_by(mut report: Report, receivers: Vec<Receiver>) -> Report {
        report.receivers = receivers;
        report
    }

    #[test]
    fn test_slot_index() {
        assert_eq!(slot_index(4, 4), 0);
        assert_eq!(slot_index(6, 4), 1);
        assert_eq!(slot_index(12, 4), 4);
        assert_eq!(slot_index(14, 4), 0);
        assert_eq!(slot_index(2, 4), 4);
        assert_eq!(slot_index(0, 0), 0);
    }

    #[test]
    fn test_unknown_tracker_one_spot_per_report() {
        let reports = vec![
            report(at(12, 4), "N0CALL", "FN20", 37),
            report(at(12, 5), "AA1AA", "FN30", 10),
            report(at(12, 6), "N0CALL", "FN20", 37),
        ];
        let groups = match_slots(&reports, &params(""));
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.reports().count() == 1));
    }

    #[test]
    fn test_dual_always_attaches() {
        // Z4 on 20m: slot 0 at minute 4, slot 1 at minute 6
        let reports = vec![
            report(at(12, 4), "N0CALL", "FN20", 10),
            report(at(12, 6), "N0CALL", "FN20xr", 13),
        ];
        let groups = match_slots(&reports, &params("Z4"));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].slot(1).unwrap().locator, "FN20xr");
    }

    #[test]
    fn test_single_tracker_ignores_other_minutes() {
        let reports = vec![
            report(at(12, 4), "N0CALL", "FN20", 10),
            report(at(12, 6), "N0CALL", "FN20", 13),
            report(at(12, 14), "N0CALL", "FN20", 10),
        ];
        let groups = match_slots(&reports, &params("z4"));
        assert_eq!(groups.len(), 2);
        assert!(groups[0].slot(1).is_none());
    }

    #[test]
    fn test_wb8elk_requires_same_locator() {
        let reports = vec![
            report(at(12, 4), "N0CALL", "FN20", 10),
            report(at(12, 6), "Q1ABCD", "FN21", 13),
            report(at(12, 14), "N0CALL", "FN20", 10),
            report(at(12, 16), "Q1ABCD", "FN20", 13),
        ];
        // w004 on 20m: channel 0, slot 0 at minute 4
        let groups = match_slots(&reports, &params("w004"));
        assert_eq!(groups.len(), 2);
        assert!(groups[0].slot(1).is_none());
        assert_eq!(groups[1].slot(1).unwrap().callsign, "Q1ABCD");
    }

    #[test]
    fn test_u4b_co_receiver_correlation() {
        // Channel 123 on 20m: slot 0 at minute 0, id "0"/"6"
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 2), "006AUO", "GK45", 0), vec![rx("K1ABC", 14_097_054)]),
            heard_by(report(at(12, 2), "006BBB", "GK45", 0), vec![rx("W2XYZ", 14_097_054)]),
        ];
        let groups = match_slots(&reports, &params("123"));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].slot(1).unwrap().callsign, "006AUO");
    }

    #[test]
    fn test_u4b_frequency_tolerance() {
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 2), "006AUO", "GK45", 0), vec![rx("K1ABC", 14_097_056)]),
        ];
        let groups = match_slots(&reports, &params("123"));
        assert!(groups[0].slot(1).is_none());
    }

    #[test]
    fn test_u4b_rejects_wrong_channel_id() {
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 2), "Q06AUO", "GK45", 0), vec![rx("K1ABC", 14_097_050)]),
        ];
        let groups = match_slots(&reports, &params("123"));
        assert!(groups[0].slot(1).is_none());
    }

    #[test]
    fn test_u4b_et_slots_correlate_with_any_earlier_slot() {
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(
                report(at(12, 2), "006AUO", "GK45", 0),
                vec![rx("K1ABC", 14_097_050), rx("W2XYZ", 14_097_100)],
            ),
            heard_by(report(at(12, 4), "006CDE", "AA00", 0), vec![rx("W2XYZ", 14_097_098)]),
        ];
        let groups = match_slots(&reports, &params("123E2"));
        assert_eq!(groups[0].slot(2).unwrap().callsign, "006CDE");
    }

    #[test]
    fn test_u4b_payload_parity_fallback() {
        // AA00 with power 0 → n = 0: even, extended telemetry
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 4), "006CDE", "AA00", 0), vec![rx("W2XYZ", 14_097_050)]),
            heard_by(report(at(12, 6), "006CDE", "AA00", 3), vec![rx("N1XYZ", 14_097_050)]),
        ];
        let groups = match_slots(&reports, &params("123E3"));
        assert_eq!(groups[0].slot(2).unwrap().callsign, "006CDE");
        // AA00 with power 3 → n = 1: basic telemetry, no fallback
        assert!(groups[0].slot(3).is_none());
    }

    #[test]
    fn test_u4b_payload_parity_not_used_for_slot_1() {
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 2), "006CDE", "AA00", 0), vec![rx("W2XYZ", 14_097_050)]),
        ];
        let groups = match_slots(&reports, &params("123"));
        assert!(groups[0].slot(1).is_none());
    }

    #[test]
    fn test_slots_beyond_et_depth_ignored() {
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 4), "006CDE", "AA00", 0), vec![rx("K1ABC", 14_097_050)]),
        ];
        let groups = match_slots(&reports, &params("123"));
        assert!(groups[0].slot(2).is_none());
    }

    #[test]
    fn test_companion_outside_window_ignored() {
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 12), "006AUO", "GK45", 0), vec![rx("K1ABC", 14_097_050)]),
        ];
        let groups = match_slots(&reports, &params("123"));
        assert_eq!(groups.len(), 1);
        assert!(groups[0].slot(1).is_none());
    }

    #[test]
    fn test_duplicate_slot_keeps_first() {
        let reports = vec![
            report(at(12, 4), "N0CALL", "FN20", 10),
            report(at(12, 6), "AA1AA", "FN20xr", 13),
            report(at(12, 6), "N0CALL", "FN21ab", 13),
        ];
        let groups = match_slots(&reports, &params("Z4"));
        assert_eq!(groups[0].slot(1).unwrap().callsign, "AA1AA");
    }

    #[test]
    fn test_callsign_filter_on_slot_0() {
        let mut params = params("Z4");
        params.callsign = Some("N0CALL".to_string());
        let reports = vec![
            report(at(12, 4), "AA1AA", "FN30", 10),
            report(at(12, 4), "N0CALL", "FN20", 10),
        ];
        let groups = match_slots(&reports, &params);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].base().callsign, "N0CALL");
    }

    #[test]
    fn test_slot_window_invariant() {
        let reports = vec![
            heard_by(report(at(12, 0), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 2), "006AUO", "GK45", 0), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 4), "006CDE", "AA00", 0), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 8), "006FGH", "AA00", 0), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 10), "N0CALL", "FN20", 37), vec![rx("K1ABC", 14_097_050)]),
            heard_by(report(at(12, 12), "006AUO", "GK45", 0), vec![rx("K1ABC", 14_097_050)]),
        ];
        let groups = match_slots(&reports, &params("u060"));
        for group in &groups {
            for (index, report) in group.reports().skip(1) {
                let elapsed = report.timestamp - group.timestamp();
                assert!(elapsed >= Duration::zero() && elapsed < Duration::minutes(10));
                assert_eq!(elapsed.num_minutes(), 2 * index as i64);
            }
        }
    }
}
