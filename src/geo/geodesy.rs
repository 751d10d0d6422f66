//! # Great-Circle Distance
//!
//! Spherical-earth distances between locator centers. Locator cells are far
//! coarser than the error of the spherical model, so no ellipsoid is used.

use std::f64::consts::PI;

/// Degrees to radians conversion factor
const DTOR: f64 = PI / 180.0;

/// Average radius for spherical Earth approximation in meters
const SPHERICAL_R: f64 = 6371e3;

/// Great-circle distance between two points
///
/// # Arguments
///
/// * `lat0`, `lon0` - First point in degrees
/// * `lat1`, `lon1` - Second point in degrees
///
/// # Returns
///
/// Distance in meters
pub fn greatcircle(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    let lat0_rad = lat0 * DTOR;
    let lon0_rad = lon0 * DTOR;
    let lat1_rad = lat1 * DTOR;
    let lon1_rad = lon1 * DTOR;

    // Rounding can push the cosine just past 1.0 for identical points
    let cos_angle = lat0_rad.sin() * lat1_rad.sin()
        + lat0_rad.cos() * lat1_rad.cos() * (lon0_rad - lon1_rad).abs().cos();

    SPHERICAL_R * cos_angle.clamp(-1.0, 1.0).acos()
}

/// Great-circle distance in kilometers
pub fn greatcircle_km(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    greatcircle(lat0, lon0, lat1, lon1) / 1000.0
}
