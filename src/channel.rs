//! # Channel Code Resolver
//!
//! Resolves a short, human-entered channel code into the tracker protocol,
//! numeric channel and band starting-minute offset used by the slot matcher.
//!
//! ## Grammar
//!
//! | Code | Tracker | Channel |
//! |------|---------|---------|
//! | (empty) | unknown | 0 |
//! | `g4` / `G4` | generic single / dual | lane of minute 4 |
//! | `z4` / `Z4` | Zachtek single / dual | lane of minute 4 |
//! | `uQ18` / `wQ18` | U4B / WB8ELK | `Q`=400 + 1×20 + lane of minute 8 |
//! | `123`, `123E`, `123E2` | U4B | 123, with 0/1/1/2 extended telemetry slots |
//!
//! ## Usage
//!
//! ```
//! use wspr_telemetry::channel::{ChannelCode, TrackerType};
//!
//! let code = ChannelCode::resolve("123E2", "20m").unwrap();
//! assert_eq!(code.tracker, TrackerType::U4b);
//! assert_eq!(code.channel, 123);
//! assert_eq!(code.et_slots, 2);
//! ```

use serde::Serialize;

use crate::error::{Result, WsprError};

/// Band name → starting-minute offset
pub const BANDS: &[(&str, u8)] = &[
    ("2200m", 0),
    ("630m", 2),
    ("160m", 4),
    ("80m", 6),
    ("60m", 8),
    ("40m", 0),
    ("30m", 2),
    ("20m", 4),
    ("17m", 6),
    ("15m", 8),
    ("12m", 0),
    ("10m", 2),
    ("6m", 4),
    ("4m", 6),
    ("2m", 8),
    ("70cm", 0),
    ("23cm", 2),
];

/// Highest channel of the default protocol
pub const MAX_U4B_CHANNEL: u16 = 599;

/// Highest number of extended telemetry slots that can be requested
pub const MAX_ET_SLOTS: u8 = 3;

/// Last slot index of a transmission sequence
pub const MAX_SLOT: usize = 4;

/// First channel-id character, indexed by `channel / 200`
const ID1_CHARS: [char; 3] = ['0', '1', 'Q'];

/// Tracker protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerType {
    /// No protocol: every report is its own spot
    Unknown,
    /// Plain WSPR, one message per sequence
    GenericSingle,
    /// Plain WSPR, type 1 + type 3 message pair
    GenericDual,
    /// Zachtek, one message per sequence
    ZachtekSingle,
    /// Zachtek, two messages per sequence
    ZachtekDual,
    /// U4B / Traquito default protocol
    U4b,
    /// WB8ELK pico tracker
    Wb8elk,
}

/// Resolved channel code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelCode {
    /// Tracker protocol
    pub tracker: TrackerType,

    /// Channel number (0-599 for the default protocol)
    pub channel: u16,

    /// Band starting-minute offset (0, 2, 4, 6 or 8)
    pub offset: u8,

    /// Extended telemetry slots requested after slot 1
    pub et_slots: u8,

    /// Code used the `u`/`w` extended channel notation
    extended: bool,
}

/// Starting-minute offset of a band
///
/// # Returns
///
/// * `Option<u8>` - Offset, or `None` for an unknown band
pub fn band_offset(band: &str) -> Option<u8> {
    BANDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(band))
        .map(|&(_, offset)| offset)
}

/// Minute of the hour (mod 10) on which a slot is transmitted
///
/// # Arguments
///
/// * `channel` - Channel number
/// * `offset` - Band starting-minute offset
/// * `slot` - Slot index (0-4)
pub fn slot_minute(channel: u16, offset: u8, slot: usize) -> u32 {
    (offset as u32 + ((channel as u32 % 5) + slot as u32) * 2) % 10
}

/// Channel lane (0-4) whose slot 0 falls on `minute`
fn minute_lane(minute: u8, offset: u8) -> u16 {
    ((minute as i32 - offset as i32) / 2 + 5).rem_euclid(5) as u16
}

fn even_minute(c: u8) -> Option<u8> {
    match c {
        b'0' | b'2' | b'4' | b'6' | b'8' => Some(c - b'0'),
        _ => None,
    }
}

impl ChannelCode {
    /// Resolve a channel code for a band
    ///
    /// # Arguments
    ///
    /// * `code` - Channel code as typed by the user
    /// * `band` - Band name (e.g. "20m")
    ///
    /// # Returns
    ///
    /// * `Result<ChannelCode>` - Resolved code
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidChannel` if the band is unknown, the code
    /// matches no grammar rule, or a number is out of range
    pub fn resolve(code: &str, band: &str) -> Result<Self> {
        let offset = band_offset(band)
            .ok_or_else(|| WsprError::InvalidChannel(format!("unknown band '{}'", band)))?;
        let code = code.trim();
        let bytes = code.as_bytes();

        let Some(&first) = bytes.first() else {
            return Ok(Self::new(TrackerType::Unknown, 0, offset, 0));
        };

        match first {
            b'g' | b'G' | b'z' | b'Z' => {
                let minute = match bytes {
                    [_, digit] => even_minute(*digit),
                    _ => None,
                }
                .ok_or_else(|| {
                    WsprError::InvalidChannel(format!(
                        "'{}': expected a letter followed by one of 0, 2, 4, 6, 8",
                        code
                    ))
                })?;

                let tracker = match first {
                    b'g' => TrackerType::GenericSingle,
                    b'G' => TrackerType::GenericDual,
                    b'z' => TrackerType::ZachtekSingle,
                    _ => TrackerType::ZachtekDual,
                };
                Ok(Self::new(tracker, minute_lane(minute, offset), offset, 0))
            }
            b'u' | b'U' | b'w' | b'W' => {
                let channel = match bytes {
                    [_, id1, id2, minute] => Self::extended_channel(*id1, *id2, *minute, offset),
                    _ => None,
                }
                .ok_or_else(|| {
                    WsprError::InvalidChannel(format!(
                        "'{}': expected a letter followed by [Q01][0-9][02468]",
                        code
                    ))
                })?;

                let tracker = if first.eq_ignore_ascii_case(&b'w') {
                    TrackerType::Wb8elk
                } else {
                    TrackerType::U4b
                };
                let mut resolved = Self::new(tracker, channel, offset, MAX_ET_SLOTS);
                resolved.extended = true;
                Ok(resolved)
            }
            _ => Self::resolve_numeric(code, offset),
        }
    }

    fn new(tracker: TrackerType, channel: u16, offset: u8, et_slots: u8) -> Self {
        Self {
            tracker,
            channel,
            offset,
            et_slots,
            extended: false,
        }
    }

    fn extended_channel(id1: u8, id2: u8, minute: u8, offset: u8) -> Option<u16> {
        let id1 = ID1_CHARS
            .iter()
            .position(|&c| c as u8 == id1.to_ascii_uppercase())? as u16;
        if !id2.is_ascii_digit() {
            return None;
        }
        let minute = even_minute(minute)?;
        Some(id1 * 200 + (id2 - b'0') as u16 * 20 + minute_lane(minute, offset))
    }

    fn resolve_numeric(code: &str, offset: u8) -> Result<Self> {
        let invalid = || {
            WsprError::InvalidChannel(format!(
                "'{}': expected a channel number optionally followed by E and a digit",
                code
            ))
        };

        let (digits, et_suffix) = match code.find(|c: char| c == 'E' || c == 'e') {
            Some(pos) => (&code[..pos], Some(&code[pos + 1..])),
            None => (code, None),
        };

        if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let channel: u16 = digits.parse().map_err(|_| invalid())?;
        if channel > MAX_U4B_CHANNEL {
            return Err(WsprError::InvalidChannel(format!(
                "channel {} is out of range (0-{})",
                channel, MAX_U4B_CHANNEL
            )));
        }

        let et_slots = match et_suffix {
            None => 0,
            Some("") => 1,
            Some(depth) => {
                let depth: u8 = match depth.as_bytes() {
                    [d] if d.is_ascii_digit() => d - b'0',
                    _ => return Err(invalid()),
                };
                if depth > MAX_ET_SLOTS {
                    return Err(WsprError::InvalidChannel(format!(
                        "extended telemetry depth {} is out of range (0-{})",
                        depth, MAX_ET_SLOTS
                    )));
                }
                depth
            }
        };

        Ok(Self::new(TrackerType::U4b, channel, offset, et_slots))
    }

    /// Minute of the hour (mod 10) on which `slot` of this channel is sent
    pub fn slot_minute(&self, slot: usize) -> u32 {
        slot_minute(self.channel, self.offset, slot)
    }

    /// Highest slot index the matcher attaches for this code
    pub fn max_slot(&self) -> usize {
        match self.tracker {
            TrackerType::Unknown | TrackerType::GenericSingle | TrackerType::ZachtekSingle => 0,
            TrackerType::GenericDual | TrackerType::ZachtekDual | TrackerType::Wb8elk => 1,
            TrackerType::U4b if self.extended => MAX_SLOT,
            TrackerType::U4b => 1 + self.et_slots as usize,
        }
    }

    /// Channel id carried by default-protocol telemetry callsigns
    ///
    /// # Returns
    ///
    /// * `Option<(char, char)>` - Expected first and third callsign characters,
    ///   or `None` for trackers that do not use channel ids
    pub fn telemetry_id(&self) -> Option<(char, char)> {
        if self.tracker != TrackerType::U4b {
            return None;
        }
        let id1 = ID1_CHARS[(self.channel / 200) as usize % ID1_CHARS.len()];
        let id3 = (b'0' + ((self.channel / 20) % 10) as u8) as char;
        Some((id1, id3))
    }
}
