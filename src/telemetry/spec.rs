//! # Extended Telemetry Spec Compiler
//!
//! Compiles the user-supplied extended telemetry program into decoders of
//! filters and extractors.
//!
//! ## Grammar
//!
//! ```text
//! spec      := decoder ('~' decoder)*
//! decoder   := filters '_' extractors
//! filters   := [filter (',' filter)*]
//! filter    := 't:' D ':' M ':' E      time filter on minute-of-day / 2
//!            | 's:' N                  slot filter
//!            | 'et0:' K                ET type 0, own slot, schema K
//!            | D ':' M ':' (E | 's')   value filter
//! extractors:= extractor (',' extractor)*
//! extractor := D ':' M ':' O ':' S     offset + ((raw / D) % M) × S
//!            | M ':' O ':' S           D follows from the previous extractor
//! ```
//!
//! Matching is case-insensitive. `D > 0`, `M > 1`, `E < M`, `S > 0`.

use crate::error::{Result, WsprError};
use crate::spot::SLOT_COUNT;

/// Characters allowed in a spec string (after lower-casing)
const SPEC_CHARS: &str = "0123456789.-:_,~est";

/// Highest schema selector accepted by `et0:K`
const MAX_ET0_SCHEMA: u64 = 3;

/// Most decimal places a resolution may request
const MAX_RESOLUTION: u8 = 6;

/// Label of the two-digit locator extension channel
pub const LOCATOR_LABEL: &str = "loc";

/// Label of the satellite count channel
pub const SATELLITES_LABEL: &str = "sats";

/// Expected value of a value filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Value(u64),
    /// Equal to the index of the slot being decoded
    CurrentSlot,
}

/// Condition a packed value must meet for a decoder to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// `((minute_of_day / 2) / divisor) % modulus == expected`
    Time {
        divisor: u64,
        modulus: u64,
        expected: u64,
    },
    /// Slot index equals the given one
    Slot(usize),
    /// `(raw / divisor) % modulus == expected`
    Value {
        divisor: u64,
        modulus: u64,
        expected: Expected,
    },
}

/// Produces one channel value: `offset + ((raw / divisor) % modulus) × scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extractor {
    pub divisor: u64,
    pub modulus: u64,
    pub offset: f64,
    pub scale: f64,
}

/// Filters and the extractors they gate
#[derive(Debug, Clone, PartialEq)]
pub struct Decoder {
    pub filters: Vec<Filter>,
    pub extractors: Vec<Extractor>,
    /// First output channel position owned by this decoder
    pub base: usize,
}

/// Compiled extended telemetry program with optional presentation data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EtSpec {
    decoders: Vec<Decoder>,
    labels: Vec<String>,
    long_labels: Vec<String>,
    units: Vec<String>,
    resolutions: Vec<Option<u8>>,
}

fn invalid(message: impl Into<String>) -> WsprError {
    WsprError::InvalidEtSpec(message.into())
}

fn parse_int(token: &str, what: &str) -> Result<u64> {
    if token.is_empty() || !token.bytes().all(|c| c.is_ascii_digit()) {
        return Err(invalid(format!("{} '{}' is not a non-negative integer", what, token)));
    }
    token
        .parse()
        .map_err(|_| invalid(format!("{} '{}' is too large", what, token)))
}

fn parse_real(token: &str, what: &str) -> Result<f64> {
    let value: f64 = token
        .parse()
        .map_err(|_| invalid(format!("{} '{}' is not a number", what, token)))?;
    if !value.is_finite() {
        return Err(invalid(format!("{} '{}' is not finite", what, token)));
    }
    Ok(value)
}

fn parse_divisor(token: &str) -> Result<u64> {
    match parse_int(token, "divisor")? {
        0 => Err(invalid("divisor must be greater than 0")),
        d => Ok(d),
    }
}

fn parse_modulus(token: &str) -> Result<u64> {
    match parse_int(token, "modulus")? {
        m if m < 2 => Err(invalid(format!("modulus {} must be greater than 1", m))),
        m => Ok(m),
    }
}

fn parse_expected(token: &str, modulus: u64) -> Result<u64> {
    let expected = parse_int(token, "expected value")?;
    if expected >= modulus {
        return Err(invalid(format!(
            "expected value {} can never match modulus {}",
            expected, modulus
        )));
    }
    Ok(expected)
}

fn parse_filter(token: &str, filters: &mut Vec<Filter>) -> Result<()> {
    let parts: Vec<&str> = token.split(':').collect();
    match parts.as_slice() {
        ["t", d, m, e] => {
            let modulus = parse_modulus(m)?;
            filters.push(Filter::Time {
                divisor: parse_divisor(d)?,
                modulus,
                expected: parse_expected(e, modulus)?,
            });
        }
        ["s", n] => {
            let slot = parse_int(n, "slot")? as usize;
            if slot >= SLOT_COUNT {
                return Err(invalid(format!("slot {} is out of range (0-4)", slot)));
            }
            filters.push(Filter::Slot(slot));
        }
        ["et0", k] => {
            let schema = parse_int(k, "et0 schema")?;
            if schema > MAX_ET0_SCHEMA {
                return Err(invalid(format!(
                    "et0 schema {} is out of range (0-{})",
                    schema, MAX_ET0_SCHEMA
                )));
            }
            // Header: type (16 values), slot (5 values), schema (4 values)
            filters.push(Filter::Value {
                divisor: 1,
                modulus: 16,
                expected: Expected::Value(0),
            });
            filters.push(Filter::Value {
                divisor: 16,
                modulus: 5,
                expected: Expected::CurrentSlot,
            });
            filters.push(Filter::Value {
                divisor: 80,
                modulus: 4,
                expected: Expected::Value(schema),
            });
        }
        [d, m, e] => {
            let modulus = parse_modulus(m)?;
            let expected = if *e == "s" {
                Expected::CurrentSlot
            } else {
                Expected::Value(parse_expected(e, modulus)?)
            };
            filters.push(Filter::Value {
                divisor: parse_divisor(d)?,
                modulus,
                expected,
            });
        }
        _ => return Err(invalid(format!("unrecognized filter '{}'", token))),
    }
    Ok(())
}

/// Divisor of the first shorthand extractor: just past the widest value filter
fn default_divisor(filters: &[Filter]) -> Result<u64> {
    filters
        .iter()
        .filter_map(|filter| match filter {
            Filter::Value {
                divisor, modulus, ..
            } => Some(divisor.checked_mul(*modulus)),
            _ => None,
        })
        .try_fold(1u64, |widest, span| match span {
            Some(span) => Ok(widest.max(span)),
            None => Err(invalid("value filter span overflows")),
        })
}

fn parse_extractor(token: &str, next_divisor: Option<u64>) -> Result<Extractor> {
    let parts: Vec<&str> = token.split(':').collect();
    let (divisor, modulus, offset, scale) = match parts.as_slice() {
        [d, m, o, s] => (parse_divisor(d)?, *m, *o, *s),
        [m, o, s] => (
            next_divisor.ok_or_else(|| invalid("extractor divisor overflows"))?,
            *m,
            *o,
            *s,
        ),
        _ => return Err(invalid(format!("unrecognized extractor '{}'", token))),
    };

    let scale = parse_real(scale, "scale")?;
    if scale <= 0.0 {
        return Err(invalid(format!("scale {} must be greater than 0", scale)));
    }

    Ok(Extractor {
        divisor,
        modulus: parse_modulus(modulus)?,
        offset: parse_real(offset, "offset")?,
        scale,
    })
}

fn parse_decoder(segment: &str, base: usize) -> Result<Decoder> {
    let (filters_spec, extractors_spec) = segment
        .split_once('_')
        .ok_or_else(|| invalid(format!("decoder '{}' has no '_' separator", segment)))?;

    let mut filters = Vec::new();
    if !filters_spec.is_empty() {
        for token in filters_spec.split(',') {
            parse_filter(token, &mut filters)?;
        }
    }

    if extractors_spec.is_empty() {
        return Err(invalid(format!("decoder '{}' has no extractors", segment)));
    }

    let mut next_divisor = Some(default_divisor(&filters)?);
    let mut extractors = Vec::new();
    for token in extractors_spec.split(',') {
        let extractor = parse_extractor(token, next_divisor)?;
        next_divisor = extractor.divisor.checked_mul(extractor.modulus);
        extractors.push(extractor);
    }

    Ok(Decoder {
        filters,
        extractors,
        base,
    })
}

/// Split a comma-separated presentation list, checking its characters
fn parse_text_list(text: &str, what: &str) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || " _-./#%()".contains(c);
    text.split(',')
        .map(|item| {
            let item = item.trim();
            if item.chars().all(allowed) {
                Ok(item.to_string())
            } else {
                Err(invalid(format!("{} '{}' contains illegal characters", what, item)))
            }
        })
        .collect()
}

fn parse_resolutions(text: &str) -> Result<Vec<Option<u8>>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|item| match item.trim() {
            "" => Ok(None),
            digits => match digits.parse::<u8>() {
                Ok(places) if places <= MAX_RESOLUTION => Ok(Some(places)),
                _ => Err(invalid(format!(
                    "resolution '{}' must be 0-{}",
                    digits, MAX_RESOLUTION
                ))),
            },
        })
        .collect()
}

impl EtSpec {
    /// Compile a spec string without presentation data
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidEtSpec` if the string breaks the grammar,
    /// a number is out of range, or a character is not allowed
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim().to_ascii_lowercase();
        if spec.is_empty() {
            return Ok(Self::default());
        }

        if let Some(c) = spec.chars().find(|&c| !SPEC_CHARS.contains(c)) {
            return Err(invalid(format!("illegal character '{}'", c)));
        }

        let mut decoders = Vec::new();
        let mut base = 0;
        for segment in spec.split('~') {
            let decoder = parse_decoder(segment, base)?;
            base += decoder.extractors.len();
            decoders.push(decoder);
        }

        Ok(Self {
            decoders,
            ..Self::default()
        })
    }

    /// Compile a spec string with its parallel presentation lists
    ///
    /// # Arguments
    ///
    /// * `spec` - Program text
    /// * `labels`, `long_labels`, `units` - Comma-separated, one per channel
    /// * `resolutions` - Comma-separated decimal places, empty for default
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidEtSpec` if any part is malformed or a list
    /// has more entries than the program has channels
    pub fn compile(
        spec: &str,
        labels: &str,
        long_labels: &str,
        units: &str,
        resolutions: &str,
    ) -> Result<Self> {
        let mut compiled = Self::parse(spec)?;
        compiled.labels = parse_text_list(labels, "label")?;
        compiled.long_labels = parse_text_list(long_labels, "long label")?;
        compiled.units = parse_text_list(units, "unit")?;
        compiled.resolutions = parse_resolutions(resolutions)?;

        let channels = compiled.channel_count();
        for (what, len) in [
            ("labels", compiled.labels.len()),
            ("long labels", compiled.long_labels.len()),
            ("units", compiled.units.len()),
            ("resolutions", compiled.resolutions.len()),
        ] {
            if len > channels {
                return Err(invalid(format!(
                    "{} {} given for {} channels",
                    len, what, channels
                )));
            }
        }

        Ok(compiled)
    }

    /// Compiled decoders in evaluation order
    pub fn decoders(&self) -> &[Decoder] {
        &self.decoders
    }

    /// Number of output channel positions
    pub fn channel_count(&self) -> usize {
        self.decoders.iter().map(|d| d.extractors.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Short label of a channel, `ET<n>` when not configured
    pub fn label(&self, index: usize) -> String {
        match self.labels.get(index) {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("ET{}", index),
        }
    }

    /// Long label of a channel, falling back to the short label
    pub fn long_label(&self, index: usize) -> String {
        match self.long_labels.get(index) {
            Some(label) if !label.is_empty() => label.clone(),
            _ => self.label(index),
        }
    }

    /// Unit of a channel
    pub fn unit(&self, index: usize) -> &str {
        self.units.get(index).map_or("", String::as_str)
    }

    /// Position of the channel with the given label (case-insensitive)
    pub fn channel_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.eq_ignore_ascii_case(label))
    }

    /// Render a channel value with its configured resolution
    pub fn format_value(&self, index: usize, value: f64) -> String {
        match self.resolutions.get(index).copied().flatten() {
            Some(places) => format!("{:.*}", places as usize, value),
            None => format!("{}", value),
        }
    }
}
