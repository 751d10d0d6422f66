//! # Grid Locator Math
//!
//! Converts Maidenhead locators of arbitrary even length to and from
//! latitude/longitude.
//!
//! ## Precision Levels
//!
//! | Pair | Alphabet | Divisions | Cell (lon × lat) |
//! |------|----------|-----------|------------------|
//! | 1 | `A`-`R` | 18 | 20° × 10° |
//! | 2 | `0`-`9` | 10 | 2° × 1° |
//! | 3 | `a`-`x` | 24 | 5' × 2.5' |
//! | 4 | `0`-`9` | 10 | 30" × 15" |
//!
//! Letter pairs and digit pairs keep alternating past the fourth pair.
//!
//! ## Usage
//!
//! ```
//! use wspr_telemetry::geo::locator::locator_to_coords;
//!
//! let (lat, lon) = locator_to_coords("FN20").unwrap();
//! assert!((lat - 40.5).abs() < 1e-9);
//! assert!((lon - (-75.0)).abs() < 1e-9);
//! ```

/// Number of fields per axis in the first letter pair
const FIELD_DIVISIONS: u32 = 18;

/// Number of subdivisions for every later letter pair
const SUBSQUARE_DIVISIONS: u32 = 24;

/// Number of subdivisions for digit pairs
const DIGIT_DIVISIONS: u32 = 10;

fn pair_divisions(pair: usize) -> u32 {
    match pair {
        0 => FIELD_DIVISIONS,
        p if p % 2 == 1 => DIGIT_DIVISIONS,
        _ => SUBSQUARE_DIVISIONS,
    }
}

fn pair_index(c: u8, pair: usize) -> Option<u32> {
    let index = if pair % 2 == 1 {
        if !c.is_ascii_digit() {
            return None;
        }
        (c - b'0') as u32
    } else {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        (c.to_ascii_uppercase() - b'A') as u32
    };

    if index < pair_divisions(pair) {
        Some(index)
    } else {
        None
    }
}

fn pair_char(index: u32, pair: usize) -> char {
    let base = match pair {
        0 => b'A',
        p if p % 2 == 1 => b'0',
        _ => b'a',
    };
    (base + index as u8) as char
}

/// Convert a locator to the center of the cell it designates
///
/// # Arguments
///
/// * `locator` - Locator of even length (2, 4, 6, 8, ...), case-insensitive
///
/// # Returns
///
/// * `Option<(f64, f64)>` - `(latitude, longitude)` in degrees, or `None` for
///   empty, odd-length or out-of-alphabet input
pub fn locator_to_coords(locator: &str) -> Option<(f64, f64)> {
    let bytes = locator.as_bytes();
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return None;
    }

    let mut lat = -90.0;
    let mut lon = -180.0;
    let mut lat_size = 180.0;
    let mut lon_size = 360.0;

    for (pair, chunk) in bytes.chunks(2).enumerate() {
        let divisions = pair_divisions(pair) as f64;
        let lon_index = pair_index(chunk[0], pair)?;
        let lat_index = pair_index(chunk[1], pair)?;

        lon_size /= divisions;
        lat_size /= divisions;
        lon += lon_index as f64 * lon_size;
        lat += lat_index as f64 * lat_size;
    }

    Some((lat + lat_size / 2.0, lon + lon_size / 2.0))
}

/// Encode a position as a locator of the given length
///
/// Field letters are upper case, subsquare letters lower case.
///
/// # Returns
///
/// * `Option<String>` - Locator, or `None` if `len` is zero or odd
pub fn coords_to_locator(lat: f64, lon: f64, len: usize) -> Option<String> {
    if len == 0 || len % 2 != 0 {
        return None;
    }

    // Cells are half-open: the north pole folds into the last row, +180° wraps to -180°.
    let mut lat_rest = (lat + 90.0).clamp(0.0, 180.0);
    let mut lon_rest = (lon + 180.0).rem_euclid(360.0);
    let mut lat_size = 180.0;
    let mut lon_size = 360.0;
    let mut locator = String::with_capacity(len);

    for pair in 0..len / 2 {
        let divisions = pair_divisions(pair);
        lon_size /= divisions as f64;
        lat_size /= divisions as f64;

        let lon_index = ((lon_rest / lon_size).floor() as u32).min(divisions - 1);
        let lat_index = ((lat_rest / lat_size).floor() as u32).min(divisions - 1);
        lon_rest -= lon_index as f64 * lon_size;
        lat_rest -= lat_index as f64 * lat_size;

        locator.push(pair_char(lon_index, pair));
        locator.push(pair_char(lat_index, pair));
    }

    Some(locator)
}

/// Check that every character of `locator` is legal for its position
pub fn is_valid_locator(locator: &str) -> bool {
    locator.len() % 2 == 0
        && locator
            .as_bytes()
            .chunks(2)
            .enumerate()
            .all(|(pair, chunk)| chunk.iter().all(|&c| pair_index(c, pair).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_char_center() {
        let (lat, lon) = locator_to_coords("FN20").unwrap();
        assert!((lat - 40.5).abs() < 1e-9);
        assert!((lon - (-75.0)).abs() < 1e-9);
    }

    #[test]
    fn test_two_char_field() {
        let (lat, lon) = locator_to_coords("JO").unwrap();
        assert!((lat - 55.0).abs() < 1e-9);
        assert!((lon - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_six_char_center() {
        // IO91wm: London, 0.0833° × 0.0417° subsquare
        let (lat, lon) = locator_to_coords("IO91wm").unwrap();
        assert!((lat - 51.5208).abs() < 0.001);
        assert!((lon - (-0.125)).abs() < 0.001);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(locator_to_coords("fn20XR"), locator_to_coords("FN20xr"));
    }

    #[test]
    fn test_eight_char_refines_six() {
        let (lat6, lon6) = locator_to_coords("FN20xr").unwrap();
        let (lat8, lon8) = locator_to_coords("FN20xr55").unwrap();
        // 8-char center stays within the 6-char cell
        assert!((lat8 - lat6).abs() < 2.5 / 60.0 / 2.0);
        assert!((lon8 - lon6).abs() < 5.0 / 60.0 / 2.0);
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert_eq!(locator_to_coords(""), None);
        assert_eq!(locator_to_coords("FN2"), None);
        assert_eq!(locator_to_coords("F"), None);
    }

    #[test]
    fn test_rejects_out_of_alphabet() {
        assert_eq!(locator_to_coords("SN20"), None); // field letters stop at R
        assert_eq!(locator_to_coords("FNA0"), None);
        assert_eq!(locator_to_coords("FN20zz"), None); // subsquare letters stop at X
    }

    #[test]
    fn test_idempotent() {
        assert_eq!(locator_to_coords("EM15ab12"), locator_to_coords("EM15ab12"));
    }

    #[test]
    fn test_round_trip_within_half_cell() {
        for locator in ["FN20", "JO65", "AA00aa", "RR99xx", "PM95uq", "FN20xr55", "IO91wm03"] {
            let (lat, lon) = locator_to_coords(locator).unwrap();
            let encoded = coords_to_locator(lat, lon, locator.len()).unwrap();
            assert!(
                encoded.eq_ignore_ascii_case(locator),
                "{} re-encoded as {}",
                locator,
                encoded
            );
        }
    }

    #[test]
    fn test_coords_to_locator_known_points() {
        assert_eq!(coords_to_locator(40.5, -75.0, 4).unwrap(), "FN20");
        assert_eq!(coords_to_locator(51.5208, -0.125, 6).unwrap(), "IO91wm");
        // North pole folds into the last row, +180° wraps around
        assert_eq!(coords_to_locator(90.0, 180.0, 2).unwrap(), "AR");
    }

    #[test]
    fn test_coords_to_locator_rejects_odd_length() {
        assert_eq!(coords_to_locator(0.0, 0.0, 3), None);
        assert_eq!(coords_to_locator(0.0, 0.0, 0), None);
    }

    #[test]
    fn test_is_valid_locator() {
        assert!(is_valid_locator("FN20"));
        assert!(is_valid_locator("FN20xr"));
        assert!(is_valid_locator(""));
        assert!(!is_valid_locator("FN2"));
        assert!(!is_valid_locator("ZZ00"));
    }
}
