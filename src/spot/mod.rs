//! # Spots
//!
//! A spot is one assembled transmission sequence: the base report (slot 0)
//! plus up to four companion slot reports, and everything decoded from them.
//!
//! Spots are built in stages, each consuming the previous stage's value:
//!
//! 1. [`matcher`] groups reports into [`SlotGroup`]s
//! 2. [`decoder`] turns a group into a [`Spot`] with protocol fields
//! 3. `telemetry::interpreter` adds decoded extended telemetry
//! 4. `metrics` adds cross-spot quantities

pub mod decoder;
pub mod matcher;
pub mod payload;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::channel::{ChannelCode, MAX_SLOT};
use crate::geo::locator::locator_to_coords;
use crate::report::Report;

/// Number of slots in a transmission sequence
pub const SLOT_COUNT: usize = MAX_SLOT + 1;

/// Decoding parameters threaded through every stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerParams {
    /// Resolved channel code
    pub channel: ChannelCode,

    /// Only accept slot-0 reports from this callsign
    pub callsign: Option<String>,

    /// Subtract 2 V from default-protocol voltages (early firmware)
    pub legacy_voltage_offset: bool,
}

impl TrackerParams {
    /// Parameters with no callsign filter and no voltage offset
    pub fn new(channel: ChannelCode) -> Self {
        Self {
            channel,
            callsign: None,
            legacy_voltage_offset: false,
        }
    }
}

/// One slot of a spot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "report", rename_all = "snake_case")]
pub enum Slot {
    /// Nothing attached
    #[default]
    Empty,
    /// Attached and decoded
    Valid(Report),
    /// Attached but failed to decode; kept for inspection
    Invalid(Report),
}

impl Slot {
    /// Attached report, valid or not
    pub fn report(&self) -> Option<&Report> {
        match self {
            Slot::Valid(report) | Slot::Invalid(report) => Some(report),
            Slot::Empty => None,
        }
    }

    /// Attached report if it decoded
    pub fn valid_report(&self) -> Option<&Report> {
        match self {
            Slot::Valid(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

/// Slot matcher output: a base report and its companions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGroup {
    base: Report,
    companions: [Option<Report>; MAX_SLOT],
}

impl SlotGroup {
    /// Start a group with `base` as slot 0
    pub fn new(base: Report) -> Self {
        Self {
            base,
            companions: Default::default(),
        }
    }

    /// Slot 0 report
    pub fn base(&self) -> &Report {
        &self.base
    }

    /// Canonical timestamp of the sequence
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.base.timestamp
    }

    /// Report attached at `index` (0 is the base)
    pub fn slot(&self, index: usize) -> Option<&Report> {
        match index {
            0 => Some(&self.base),
            i if i <= MAX_SLOT => self.companions[i - 1].as_ref(),
            _ => None,
        }
    }

    /// Whether a companion can still be attached at `index`
    pub fn is_free(&self, index: usize) -> bool {
        (1..=MAX_SLOT).contains(&index) && self.companions[index - 1].is_none()
    }

    /// Attach a companion at a free index
    ///
    /// # Returns
    ///
    /// * `bool` - `false` if the index is out of range or already taken
    pub fn attach(&mut self, index: usize, report: Report) -> bool {
        if !self.is_free(index) {
            return false;
        }
        self.companions[index - 1] = Some(report);
        true
    }

    /// Attached slots as (index, report), in slot order
    pub fn reports(&self) -> impl Iterator<Item = (usize, &Report)> {
        (0..SLOT_COUNT).filter_map(move |i| self.slot(i).map(|r| (i, r)))
    }

    fn into_slots(self) -> [Slot; SLOT_COUNT] {
        let [s1, s2, s3, s4] = self.companions;
        [Some(self.base), s1, s2, s3, s4].map(|slot| slot.map_or(Slot::Empty, Slot::Valid))
    }
}

/// An assembled and decoded transmission sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spot {
    /// Timestamp of slot 0
    pub timestamp: DateTime<Utc>,

    /// Slots 0-4
    pub slots: [Slot; SLOT_COUNT],

    /// Best known locator (4, 6 or 8 characters)
    pub locator: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub altitude_m: Option<f64>,
    pub speed_kph: Option<f64>,
    pub voltage_v: Option<f64>,
    pub temperature_c: Option<f64>,

    /// Speed derived from consecutive good fixes
    pub computed_speed_kph: Option<f64>,
    pub vertical_speed_m_per_min: Option<f64>,
    pub sun_elevation_deg: Option<f64>,

    /// Distinct receivers across valid slots
    pub receiver_count: usize,
    pub max_receiver_distance_m: Option<f64>,
    pub max_snr_db: Option<i32>,

    /// Packed extended telemetry per slot index
    pub raw_et: [Option<u64>; SLOT_COUNT],

    /// Decoded extended telemetry channels at fixed positions
    pub decoded_et: Vec<Option<f64>>,
}

impl Spot {
    /// Undecoded spot carrying the group's slots and the base locator
    pub fn from_group(group: SlotGroup) -> Self {
        let timestamp = group.timestamp();
        let locator = group.base().locator.clone();

        let mut spot = Self {
            timestamp,
            slots: group.into_slots(),
            locator: String::new(),
            latitude: None,
            longitude: None,
            altitude_m: None,
            speed_kph: None,
            voltage_v: None,
            temperature_c: None,
            computed_speed_kph: None,
            vertical_speed_m_per_min: None,
            sun_elevation_deg: None,
            receiver_count: 0,
            max_receiver_distance_m: None,
            max_snr_db: None,
            raw_et: [None; SLOT_COUNT],
            decoded_et: Vec::new(),
        };
        spot.set_locator(locator);
        spot
    }

    /// Slot 0 report
    pub fn base(&self) -> Option<&Report> {
        self.slots[0].report()
    }

    /// Valid report at `index`
    pub fn slot(&self, index: usize) -> Option<&Report> {
        self.slots.get(index).and_then(Slot::valid_report)
    }

    /// Replace the locator and recompute coordinates from it
    pub fn set_locator(&mut self, locator: String) {
        match locator_to_coords(&locator) {
            Some((lat, lon)) => {
                self.latitude = Some(lat);
                self.longitude = Some(lon);
            }
            None => {
                self.latitude = None;
                self.longitude = None;
            }
        }
        self.locator = locator;
    }

    /// Flag the report at `index` as failed to decode
    pub fn invalidate(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = match std::mem::take(slot) {
                Slot::Valid(report) => Slot::Invalid(report),
                other => other,
            };
        }
    }

    /// Coordinates, when the locator resolved
    pub fn coords(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}
