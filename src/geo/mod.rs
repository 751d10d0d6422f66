//! # Geographic Utilities
//!
//! Locator codec, great-circle distance and sun position.

pub mod geodesy;
pub mod locator;
pub mod sun;
