//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use chrono::{DateTime, Utc};
use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::channel::ChannelCode;
use crate::error::{Result, WsprError};
use crate::report::wire::parse_timestamp;
use crate::source::{QueryWindow, DEFAULT_MAX_RANGE_DAYS};
use crate::spot::TrackerParams;
use crate::telemetry::EtSpec;

/// Longest allowed poll interval in seconds
const MAX_POLL_INTERVAL_S: u64 = 3600;

/// Longest allowed query range in days
const MAX_RANGE_DAYS_LIMIT: u32 = 366;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    pub query: QueryConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracker identification
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Channel code (empty for no slot matching)
    #[serde(default)]
    pub channel: String,

    #[serde(default = "default_band")]
    pub band: String,

    /// Only accept slot-0 reports from this callsign (empty for any)
    #[serde(default)]
    pub callsign: String,

    #[serde(default)]
    pub legacy_voltage_offset: bool,
}

/// Extended telemetry program and its presentation
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub spec: String,

    #[serde(default)]
    pub labels: String,

    #[serde(default)]
    pub long_labels: String,

    #[serde(default)]
    pub units: String,

    #[serde(default)]
    pub resolutions: String,
}

/// Query window
#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    pub start_date: String,

    /// Empty for open-ended
    #[serde(default)]
    pub end_date: String,

    #[serde(default = "default_max_range_days")]
    pub max_range_days: u32,
}

/// Report input
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_input_path")]
    pub path: String,

    /// Seconds between polls, 0 for a single pass
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: u64,
}

/// Spot output
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,

    #[serde(default = "default_output_format")]
    pub format: String,
}

/// Log output
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily log files (empty for stdout only)
    #[serde(default)]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: default_output_format(),
        }
    }
}

// Default value functions
fn default_band() -> String { "20m".to_string() }

fn default_max_range_days() -> u32 { DEFAULT_MAX_RANGE_DAYS }

fn default_input_path() -> String { "reports.json".to_string() }
fn default_poll_interval_s() -> u64 { 120 }

fn default_output_path() -> String { "spots.jsonl".to_string() }
fn default_output_format() -> String { "jsonl".to_string() }

fn config_error(message: impl std::fmt::Display) -> WsprError {
    WsprError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wspr_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Channel, telemetry and date problems are reported with their own
    /// error variants. Everything else is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        self.tracker_params()?;
        self.et_spec()?;

        if self.query.max_range_days == 0 || self.query.max_range_days > MAX_RANGE_DAYS_LIMIT {
            return Err(config_error(format!(
                "max_range_days must be between 1 and {}",
                MAX_RANGE_DAYS_LIMIT
            )));
        }
        // An open end is bounded against the clock each time the window is used
        let start = parse_timestamp(&self.query.start_date)?;
        self.query_window(start)?;

        if self.input.path.is_empty() {
            return Err(config_error("input path cannot be empty"));
        }

        if self.input.poll_interval_s > MAX_POLL_INTERVAL_S {
            return Err(config_error(format!(
                "poll_interval_s must be between 0 and {}",
                MAX_POLL_INTERVAL_S
            )));
        }

        if self.output.path.is_empty() {
            return Err(config_error("output path cannot be empty"));
        }

        // Validate output format
        if self.output.format != "jsonl" {
            return Err(config_error("output format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }

    /// Decoding parameters for the configured tracker
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidChannel` if the channel code does not
    /// resolve for the band
    pub fn tracker_params(&self) -> Result<TrackerParams> {
        let channel = ChannelCode::resolve(&self.tracker.channel, &self.tracker.band)?;
        let callsign = match self.tracker.callsign.trim() {
            "" => None,
            callsign => Some(callsign.to_ascii_uppercase()),
        };
        Ok(TrackerParams {
            channel,
            callsign,
            legacy_voltage_offset: self.tracker.legacy_voltage_offset,
        })
    }

    /// Compiled extended telemetry program
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidEtSpec` if the program or its presentation
    /// lists are malformed
    pub fn et_spec(&self) -> Result<EtSpec> {
        let t = &self.telemetry;
        EtSpec::compile(&t.spec, &t.labels, &t.long_labels, &t.units, &t.resolutions)
    }

    /// Validated query window
    ///
    /// # Arguments
    ///
    /// * `now` - Current time, bounding an open-ended window
    ///
    /// # Errors
    ///
    /// Returns `WsprError::InvalidDate` if the dates do not parse, are out
    /// of order, or span too long a range
    pub fn query_window(&self, now: DateTime<Utc>) -> Result<QueryWindow> {
        QueryWindow::parse(
            &self.query.start_date,
            &self.query.end_date,
            self.query.max_range_days,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::TrackerType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        Config {
            tracker: TrackerConfig {
                channel: "123E2".to_string(),
                band: default_band(),
                callsign: "n0call".to_string(),
                legacy_voltage_offset: false,
            },
            telemetry: TelemetryConfig {
                spec: "et0:0_1101:0:1,100:0:1,101:0:10,41:0:1".to_string(),
                labels: "Alt,Loc,Temp,Sats".to_string(),
                long_labels: String::new(),
                units: "m,,C,".to_string(),
                resolutions: "0,0,1,0".to_string(),
            },
            query: QueryConfig {
                start_date: "2024-05-01".to_string(),
                end_date: "2024-05-20".to_string(),
                max_range_days: default_max_range_days(),
            },
            input: InputConfig {
                path: default_input_path(),
                poll_interval_s: default_poll_interval_s(),
            },
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());

        let params = config.tracker_params().unwrap();
        assert_eq!(params.channel.tracker, TrackerType::U4b);
        assert_eq!(params.channel.et_slots, 2);
        assert_eq!(params.callsign.as_deref(), Some("N0CALL"));
        assert_eq!(config.et_spec().unwrap().channel_count(), 4);
    }

    #[test]
    fn test_invalid_channel() {
        let mut config = create_valid_config();
        config.tracker.channel = "600".to_string();
        assert!(matches!(config.validate(), Err(WsprError::InvalidChannel(_))));
    }

    #[test]
    fn test_invalid_band() {
        let mut config = create_valid_config();
        config.tracker.band = "11m".to_string();
        assert!(matches!(config.validate(), Err(WsprError::InvalidChannel(_))));
    }

    #[test]
    fn test_invalid_et_spec() {
        let mut config = create_valid_config();
        config.telemetry.spec = "et0:9_10:0:1".to_string();
        assert!(matches!(config.validate(), Err(WsprError::InvalidEtSpec(_))));
    }

    #[test]
    fn test_invalid_dates() {
        let mut config = create_valid_config();
        config.query.end_date = "2024-04-01".to_string();
        assert!(matches!(config.validate(), Err(WsprError::InvalidDate(_))));

        let mut config = create_valid_config();
        config.query.end_date = "2024-07-01".to_string();
        assert!(matches!(config.validate(), Err(WsprError::InvalidDate(_))));
    }

    #[test]
    fn test_open_end_is_bounded_when_used() {
        let mut config = create_valid_config();
        config.query.end_date = String::new();
        assert!(config.validate().is_ok());

        let start = parse_timestamp(&config.query.start_date).unwrap();
        assert!(config.query_window(start + chrono::Duration::days(10)).is_ok());
        assert!(matches!(
            config.query_window(start + chrono::Duration::days(40)),
            Err(WsprError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_missing_start_date() {
        let mut config = create_valid_config();
        config.query.start_date = String::new();
        assert!(matches!(config.validate(), Err(WsprError::InvalidDate(_))));
    }

    #[test]
    fn test_invalid_max_range_days() {
        let mut config = create_valid_config();
        config.query.max_range_days = 0;
        assert!(matches!(config.validate(), Err(WsprError::Config(_))));

        config.query.max_range_days = 367;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_poll_interval() {
        let mut config = create_valid_config();
        config.input.poll_interval_s = 0;
        assert!(config.validate().is_ok());

        config.input.poll_interval_s = 3601;
        assert!(matches!(config.validate(), Err(WsprError::Config(_))));
    }

    #[test]
    fn test_empty_paths() {
        let mut config = create_valid_config();
        config.input.path = String::new();
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.output.path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_output_format() {
        let mut config = create_valid_config();
        config.output.format = "csv".to_string();
        assert!(matches!(config.validate(), Err(WsprError::Config(_))));
    }

    #[test]
    fn test_empty_callsign_means_any() {
        let mut config = create_valid_config();
        config.tracker.callsign = "  ".to_string();
        assert_eq!(config.tracker_params().unwrap().callsign, None);
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[tracker]
channel = "Z4"

[query]
start_date = "2024-05-01"
end_date = "2024-05-02"

[input]
path = "reports.json"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.tracker.band, "20m");
        assert_eq!(config.input.poll_interval_s, 120);
        assert_eq!(config.output.format, "jsonl");
        assert!(config.telemetry.spec.is_empty());
        assert!(config.logging.dir.is_empty());
        assert_eq!(
            config.tracker_params().unwrap().channel.tracker,
            TrackerType::ZachtekDual
        );
    }

    #[test]
    fn test_load_shipped_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let config = Config::load(&path).unwrap();

        assert_eq!(config.tracker_params().unwrap().channel.tracker, TrackerType::U4b);
        assert_eq!(config.et_spec().unwrap().channel_count(), 4);
        assert!(config.query_window(Utc::now()).is_ok());
    }

    #[test]
    fn test_load_config_missing_section() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[tracker]\nchannel = \"Z4\"\n").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(WsprError::Config(_))
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/config.toml"),
            Err(WsprError::Io(_))
        ));
    }
}
