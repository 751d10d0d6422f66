//! # Decoding Pipeline
//!
//! Runs the decoding stages in order over a report set:
//!
//! ```text
//! reports → match_slots → decode → interpret → derive → spots
//! ```
//!
//! Every stage is a pure function of its inputs, so the whole set is simply
//! reprocessed whenever new reports arrive.

use tracing::{debug, info};

use crate::geo::sun::SunPosition;
use crate::metrics::derive;
use crate::report::merge::merge;
use crate::report::Report;
use crate::spot::decoder::decode;
use crate::spot::matcher::match_slots;
use crate::spot::{Spot, TrackerParams};
use crate::telemetry::spec::SATELLITES_LABEL;
use crate::telemetry::{interpret, EtSpec};

/// Turn a sorted report set into decoded spots
///
/// # Arguments
///
/// * `reports` - Reports ordered by (timestamp, callsign)
/// * `params` - Tracker parameters
/// * `et` - Extended telemetry program (may be empty)
/// * `sun` - Sun position provider
///
/// # Returns
///
/// * `Vec<Spot>` - Spots in time order
pub fn process(
    reports: &[Report],
    params: &TrackerParams,
    et: &EtSpec,
    sun: &dyn SunPosition,
) -> Vec<Spot> {
    let groups = match_slots(reports, params);
    let group_count = groups.len();

    let spots: Vec<Spot> = groups
        .into_iter()
        .filter_map(|group| decode(group, params))
        .map(|spot| interpret(et, spot))
        .collect();

    debug!(
        "Decoded {} of {} matched groups from {} reports",
        spots.len(),
        group_count,
        reports.len()
    );

    derive(spots, et.channel_index(SATELLITES_LABEL), sun)
}

/// Accumulated report set of one tracker
#[derive(Debug, Clone)]
pub struct Tracker {
    params: TrackerParams,
    et: EtSpec,
    reports: Vec<Report>,
}

impl Tracker {
    /// Create a tracker with no reports
    pub fn new(params: TrackerParams, et: EtSpec) -> Self {
        Self {
            params,
            et,
            reports: Vec::new(),
        }
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    pub fn et_spec(&self) -> &EtSpec {
        &self.et
    }

    /// Known reports, ordered by (timestamp, callsign)
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Merge a sorted batch into the known reports
    ///
    /// # Returns
    ///
    /// * `usize` - Number of reports not seen before
    pub fn ingest(&mut self, batch: &[Report]) -> usize {
        let merged = merge(&self.reports, batch);
        self.reports = merged.reports;
        if merged.new_count > 0 {
            info!(
                "Ingested {} new reports ({} total)",
                merged.new_count,
                self.reports.len()
            );
        }
        merged.new_count
    }

    /// Decode all known reports from scratch
    pub fn spots(&self, sun: &dyn SunPosition) -> Vec<Spot> {
        process(&self.reports, &self.params, &self.et, sun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelCode;
    use crate::geo::sun::{AlmanacSun, MockSunPosition};
    use crate::report::fixtures::{at, report};

    fn params(code: &str) -> TrackerParams {
        TrackerParams::new(ChannelCode::resolve(code, "20m").unwrap())
    }

    #[test]
    fn test_process_unknown_tracker() {
        let reports = vec![
            report(at(12, 0), "N0CALL", "FN20", 37),
            report(at(12, 2), "N0CALL", "FN21", 37),
        ];
        let spots = process(&reports, &params(""), &EtSpec::default(), &AlmanacSun);

        assert_eq!(spots.len(), 2);
        assert_eq!(spots[1].locator, "FN21");
        assert!(spots[0].sun_elevation_deg.is_some());
        assert_eq!(spots[0].receiver_count, 1);
    }

    #[test]
    fn test_process_zachtek_dual_drops_unpaired() {
        // "Z4" on 20m: slot 0 on minute 4, slot 1 on minute 6
        let reports = vec![
            report(at(12, 4), "N0CALL", "FN20", 37),
            report(at(12, 6), "N0CALL", "FN31", 10),
            report(at(12, 14), "N0CALL", "FN20", 37),
        ];
        let mut sun = MockSunPosition::new();
        sun.expect_elevation_deg().returning(|_, _, _| 10.0);

        let spots = process(&reports, &params("Z4"), &EtSpec::default(), &sun);
        assert_eq!(spots.len(), 1);
        assert_eq!(spots[0].locator, "FN31");
        assert_eq!(spots[0].altitude_m, Some(37.0 * 300.0 + 10.0 * 20.0));
        assert_eq!(spots[0].sun_elevation_deg, Some(10.0));
    }

    #[test]
    fn test_tracker_ingest_counts_new_reports() {
        let mut tracker = Tracker::new(params(""), EtSpec::default());
        let first = vec![report(at(12, 0), "N0CALL", "FN20", 37)];
        let second = vec![
            report(at(12, 0), "N0CALL", "FN20", 37),
            report(at(12, 10), "N0CALL", "FN20", 37),
        ];

        assert_eq!(tracker.ingest(&first), 1);
        assert_eq!(tracker.ingest(&second), 1);
        assert_eq!(tracker.ingest(&second), 0);
        assert_eq!(tracker.reports().len(), 2);
        assert_eq!(tracker.spots(&AlmanacSun).len(), 2);
    }

    #[test]
    fn test_reprocessing_is_deterministic() {
        let mut tracker = Tracker::new(params("Z4"), EtSpec::default());
        tracker.ingest(&[
            report(at(12, 4), "N0CALL", "FN20", 37),
            report(at(12, 6), "N0CALL", "FN31", 10),
        ]);
        assert_eq!(tracker.spots(&AlmanacSun), tracker.spots(&AlmanacSun));
    }
}
