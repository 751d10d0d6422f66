//! # Report Merge
//!
//! Merges two (timestamp, callsign)-ordered report batches into one
//! deduplicated, ordered superset in O(n + m).

use std::cmp::Ordering;

use super::Report;

/// Result of merging a new batch into the known reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Merged reports, ordered by (timestamp, callsign)
    pub reports: Vec<Report>,

    /// Number of keys present only in the incoming batch
    pub new_count: usize,
}

/// Merge an incoming batch into the existing reports
///
/// For a key present in both inputs the incoming report wins, as later
/// fetches carry at least as many receivers. Both inputs must be sorted by
/// key with no duplicate keys.
///
/// # Arguments
///
/// * `existing` - Previously known reports
/// * `incoming` - Newly fetched reports
///
/// # Returns
///
/// * `MergeResult` - Merged reports and the count of new keys
pub fn merge(existing: &[Report], incoming: &[Report]) -> MergeResult {
    let mut reports = Vec::with_capacity(existing.len().max(incoming.len()));
    let mut new_count = 0;
    let mut i = 0;
    let mut j = 0;

    while i < existing.len() && j < incoming.len() {
        match existing[i].key().cmp(&incoming[j].key()) {
            Ordering::Less => {
                reports.push(existing[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                reports.push(incoming[j].clone());
                new_count += 1;
                j += 1;
            }
            Ordering::Equal => {
                reports.push(incoming[j].clone());
                i += 1;
                j += 1;
            }
        }
    }

    reports.extend_from_slice(&existing[i..]);
    new_count += incoming.len() - j;
    reports.extend_from_slice(&incoming[j..]);

    MergeResult { reports, new_count }
}
