//! # Extended Telemetry
//!
//! User-programmable decoding of the packed integers carried by extended
//! telemetry slots.
//!
//! - [`spec`] compiles the program text once into filters and extractors
//! - [`interpreter`] evaluates the compiled program per spot

pub mod interpreter;
pub mod spec;

pub use interpreter::interpret;
pub use spec::EtSpec;
