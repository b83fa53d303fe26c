//! Allows configuration stuff to be read from settings.json
//!
//! Lets you point the client at a different relay server or change the
//! tone defaults for local testing without rebuilding.
use json::JsonValue;
use regex::Regex;
use simple_error::bail;
use std::{error::Error, fmt, io::ErrorKind};

use crate::common::box_error::BoxError;

use log::{info, warn};

#[derive(Debug)]
pub struct BadConfigValue {
    key: String,
}

impl fmt::Display for BadConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Configuration value '{}' has the wrong type", self.key)
    }
}

impl Error for BadConfigValue {}

/// The handful of values the client reads at startup.
///
/// Anything not present in the settings file keeps its default.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ws_url: String,
    pub frequency: f64,
    pub volume_db: f64,
    pub wpm: u32,
    pub target_latency_msec: u32,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            ws_url: String::from("ws://beep-api.jamjaws.com/beep"),
            frequency: 600.0,
            volume_db: -20.0,
            wpm: 20,
            target_latency_msec: 200,
        }
    }
}

impl Settings {
    /// Load settings from the named json file, falling back to the
    /// defaults for anything missing.  A file that does not exist is
    /// fine (first run); a file with a wrongly typed value is not.
    pub fn build(filename: &str) -> Result<Settings, BoxError> {
        // Validate filename only contains valid characters and ends in .json
        let filename_regex = Regex::new(r"^[a-zA-Z0-9_\-\.]+\.json$").unwrap();
        if !filename_regex.is_match(filename) {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "Invalid filename '{}' - must contain only letters, numbers, underscore, dash, dot and end in .json",
                    filename
                ),
            )
            .into());
        }

        let mut settings = Settings::default();
        match std::fs::read_to_string(filename) {
            Ok(raw_data) => {
                let parsed = json::parse(&raw_data)?;
                settings.apply(&parsed)?;
                info!("Loaded settings from {}: {:?}", filename, settings);
            }
            Err(err) => {
                warn!("Using default settings: {}", err);
            }
        }
        if settings.wpm == 0 {
            bail!("wpm must be positive");
        }
        if settings.frequency <= 0.0 {
            bail!("frequency must be positive");
        }
        Ok(settings)
    }

    fn apply(&mut self, parsed: &JsonValue) -> Result<(), BadConfigValue> {
        if !parsed["ws_url"].is_null() {
            self.ws_url = pick_str(parsed, "ws_url")?;
        }
        if !parsed["frequency"].is_null() {
            self.frequency = pick_f64(parsed, "frequency")?;
        }
        if !parsed["volume_db"].is_null() {
            self.volume_db = pick_f64(parsed, "volume_db")?;
        }
        if !parsed["wpm"].is_null() {
            self.wpm = pick_u32(parsed, "wpm")?;
        }
        if !parsed["target_latency_msec"].is_null() {
            self.target_latency_msec = pick_u32(parsed, "target_latency_msec")?;
        }
        Ok(())
    }
}

fn pick_str(parsed: &JsonValue, key: &str) -> Result<String, BadConfigValue> {
    match parsed[key].as_str() {
        Some(val) => Ok(String::from(val)),
        None => Err(BadConfigValue {
            key: key.to_string(),
        }),
    }
}

fn pick_f64(parsed: &JsonValue, key: &str) -> Result<f64, BadConfigValue> {
    match parsed[key].as_f64() {
        Some(val) => Ok(val),
        None => Err(BadConfigValue {
            key: key.to_string(),
        }),
    }
}

fn pick_u32(parsed: &JsonValue, key: &str) -> Result<u32, BadConfigValue> {
    match parsed[key].as_u32() {
        Some(val) => Ok(val),
        None => Err(BadConfigValue {
            key: key.to_string(),
        }),
    }
}
