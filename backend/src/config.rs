//! `flightfollowing.ini`: defaults, parsing and first-run creation.
//!
//! Every key is optional; missing keys keep their defaults. A missing file
//! is created with defaults and reported as [`ConfigError::Created`], since
//! the Geo Service credential has to be filled in by hand before anything
//! useful can happen.

use crate::error::ConfigError;
use crate::geonames::DEFAULT_GEONAMES_URL;
use crate::phrases::DistanceUnits;
use crate::telemetry_source::DEFAULT_BRIDGE_ADDRESS;
use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "flightfollowing.ini";
pub const PLACEHOLDER_USERNAME: &str = "your_username";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechOutput {
    /// Lines on stdout for a screen reader.
    #[default]
    ScreenReader,
    /// External text-to-speech program.
    Tts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyConfig {
    pub command: char,
    pub agl: char,
    pub asl: char,
    pub heading: char,
    pub ias: char,
    pub tas: char,
    pub mach: char,
    pub city: char,
    pub waypoint: char,
    pub dest: char,
    pub attitude: char,
    pub message: char,
    pub follow_toggle: char,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            command: ']',
            agl: 'g',
            asl: 'a',
            heading: 'h',
            ias: 's',
            tas: 't',
            mach: 'm',
            city: 'c',
            waypoint: 'w',
            dest: 'd',
            attitude: '[',
            message: 'r',
            follow_toggle: 'f',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub geonames_username: String,
    pub voice_rate: i8,
    pub speech_output: SpeechOutput,
    pub tts_command: String,
    pub flight_following: bool,
    pub read_instrumentation: bool,
    pub read_simconnect: bool,
    /// Flight-following period.
    pub interval: Duration,
    pub distance_units: DistanceUnits,
    pub bridge_address: String,
    pub geonames_url: String,
    pub hotkeys: HotkeyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geonames_username: PLACEHOLDER_USERNAME.to_string(),
            voice_rate: 5,
            speech_output: SpeechOutput::ScreenReader,
            tts_command: "espeak-ng".to_string(),
            flight_following: true,
            read_instrumentation: true,
            read_simconnect: true,
            interval: Duration::from_secs(10 * 60),
            distance_units: DistanceUnits::Kilometres,
            bridge_address: DEFAULT_BRIDGE_ADDRESS.to_string(),
            geonames_url: DEFAULT_GEONAMES_URL.to_string(),
            hotkeys: HotkeyConfig::default(),
        }
    }
}

const DEFAULT_FILE: &str = "\
[config]
# Flight Following requires a username from the Geonames service
geonames_username = your_username
# voice rate for text to speech output, -10 to 10
voice_rate = 5
# speech output: 0 - screen reader, 1 - text to speech program
speech_output = 0
# text to speech program used when speech_output is 1
tts_command = espeak-ng
# Read closest city info.
flight_following = 1
# Automatically read aircraft instrumentation.
read_instrumentation = 1
# Read SimConnect messages.
read_simconnect = 1
# time interval for reading of nearest city, in minutes
interval = 10
# Distance units: 0 - Kilometers, 1 - Miles
distance_units = 0
# address of the simulator telemetry bridge
bridge_address = 127.0.0.1:9002
# Geonames web service
geonames_url = http://api.geonames.org

[hotkeys]
# command key: This key must be pressed before the other commands listed below
command_key = ]
agl_key = g
asl_key = a
heading_key = h
ias_key = s
tas_key = t
mach_key = m
city_key = c
waypoint_key = w
dest_key = d
attitude_key = [
message_key = r
follow_toggle_key = f
";

/// Config file next to the executable, or the first CLI argument.
pub fn config_path(arg: Option<String>) -> PathBuf {
    if let Some(arg) = arg {
        return PathBuf::from(arg);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(CONFIG_FILE_NAME)
}

/// Load and validate the config, creating a default file if there is none.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file found, creating one");
        std::fs::write(path, DEFAULT_FILE).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        return Err(ConfigError::Created {
            path: path.to_path_buf(),
        });
    }
    let ini = Ini::load_from_file(path)?;
    let config = parse_ini(&ini)?;
    tracing::info!(path = %path.display(), "config file loaded");
    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(section: &str, key: &str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(section, key, v, "must be 1 or 0")),
    }
}

fn parse_key(key: &str, v: &str) -> Result<char, ConfigError> {
    let mut chars = v.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(invalid("hotkeys", key, v, "must be a single character")),
    }
}

/// Overlay the INI contents on the defaults.
pub fn parse_ini(ini: &Ini) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    if let Some(section) = ini.section(Some("config")) {
        if let Some(v) = section.get("geonames_username") {
            config.geonames_username = v.trim().to_string();
        }
        if let Some(v) = section.get("voice_rate") {
            config.voice_rate = v
                .trim()
                .parse::<i8>()
                .ok()
                .filter(|r| (-10..=10).contains(r))
                .ok_or_else(|| invalid("config", "voice_rate", v, "must be between -10 and 10"))?;
        }
        if let Some(v) = section.get("speech_output") {
            config.speech_output = match v.trim() {
                "0" => SpeechOutput::ScreenReader,
                "1" => SpeechOutput::Tts,
                _ => return Err(invalid("config", "speech_output", v, "must be 0 or 1")),
            };
        }
        if let Some(v) = section.get("tts_command") {
            config.tts_command = v.trim().to_string();
        }
        if let Some(v) = section.get("flight_following") {
            config.flight_following = parse_bool("config", "flight_following", v)?;
        }
        if let Some(v) = section.get("read_instrumentation") {
            config.read_instrumentation = parse_bool("config", "read_instrumentation", v)?;
        }
        if let Some(v) = section.get("read_simconnect") {
            config.read_simconnect = parse_bool("config", "read_simconnect", v)?;
        }
        if let Some(v) = section.get("interval") {
            let minutes = v
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|m| m.is_finite() && *m > 0.0)
                .ok_or_else(|| invalid("config", "interval", v, "must be a positive number of minutes"))?;
            config.interval = Duration::from_secs_f64(minutes * 60.0);
        }
        if let Some(v) = section.get("distance_units") {
            config.distance_units = match v.trim() {
                "0" => DistanceUnits::Kilometres,
                "1" => DistanceUnits::Miles,
                _ => return Err(invalid("config", "distance_units", v, "must be 0 or 1")),
            };
        }
        if let Some(v) = section.get("bridge_address") {
            config.bridge_address = v.trim().to_string();
        }
        if let Some(v) = section.get("geonames_url") {
            config.geonames_url = v.trim().to_string();
        }
    }

    if let Some(section) = ini.section(Some("hotkeys")) {
        let keys = &mut config.hotkeys;
        let slots: [(&str, &mut char); 13] = [
            ("command_key", &mut keys.command),
            ("agl_key", &mut keys.agl),
            ("asl_key", &mut keys.asl),
            ("heading_key", &mut keys.heading),
            ("ias_key", &mut keys.ias),
            ("tas_key", &mut keys.tas),
            ("mach_key", &mut keys.mach),
            ("city_key", &mut keys.city),
            ("waypoint_key", &mut keys.waypoint),
            ("dest_key", &mut keys.dest),
            ("attitude_key", &mut keys.attitude),
            ("message_key", &mut keys.message),
            ("follow_toggle_key", &mut keys.follow_toggle),
        ];
        for (name, slot) in slots {
            if let Some(v) = section.get(name) {
                *slot = parse_key(name, v)?;
            }
        }
    }

    let username = config.geonames_username.as_str();
    if username.is_empty() || username == PLACEHOLDER_USERNAME {
        return Err(ConfigError::PlaceholderCredential);
    }
    Ok(config)
}

impl Config {
    /// Startup notices for features switched off in the file.
    pub fn disabled_notices(&self) -> Vec<&'static str> {
        let mut notices = Vec::new();
        if !self.flight_following {
            notices.push("Flight Following functions disabled.");
        }
        if !self.read_instrumentation {
            notices.push("instrumentation disabled.");
        }
        if !self.read_simconnect {
            notices.push("Sim Connect messages disabled.");
        }
        notices
    }
}
