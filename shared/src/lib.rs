use serde::{Deserialize, Serialize};
use std::fmt;

/// Compass-style angle, always kept in [0, 360) degrees.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub fn from_degrees(degrees: f64) -> Self {
        let wrapped = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if wrapped >= 360.0 {
            Angle(0.0)
        } else {
            Angle(wrapped)
        }
    }

    pub fn degrees(self) -> f64 {
        self.0
    }

    /// Same angle in (-180, 180], for attitude and variation readouts.
    pub fn signed(self) -> f64 {
        if self.0 > 180.0 { self.0 - 360.0 } else { self.0 }
    }

    /// Whole degrees for speech, 360 folded back to 0.
    pub fn whole_degrees(self) -> u16 {
        (self.0.round() as u16) % 360
    }
}

/// Transponder code as the simulator stores it: four BCD nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Squawk(pub u16);

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Autobrake {
    Rto,
    #[default]
    Off,
    Position(u8),
    Max,
    Unknown(u8),
}

impl Autobrake {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Autobrake::Rto,
            1 => Autobrake::Off,
            2..=4 => Autobrake::Position(raw - 1),
            5 => Autobrake::Max,
            other => Autobrake::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Radios {
    pub com1_mhz: f64,
    pub com2_mhz: f64,
    pub active_flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Altitude {
    pub asl_ft: i64,
    pub ground_ft: f64,
}

impl Altitude {
    pub fn agl_ft(&self) -> i64 {
        (self.asl_ft as f64 - self.ground_ft).round() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Autopilot {
    pub master: bool,
    pub nav_lock: bool,
    pub heading_lock: bool,
    pub heading_target: Angle,
    pub altitude_lock: bool,
    pub altitude_target_ft: f64,
    pub airspeed_hold: bool,
    pub airspeed_target_kt: i16,
    pub yaw_damper: bool,
    pub toga: bool,
    pub autothrottle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Airspeed {
    pub indicated_kt: i64,
    pub true_kt: i64,
    pub mach: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub distance_m: f64,
    pub bearing: Angle,
    pub time_enroute_s: u32,
    /// Wall-clock arrival, "HH:MM".
    pub eta: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub time_enroute_s: u32,
    pub eta: String,
    pub route_distance_m: f64,
    pub fuel_burn_gal: f64,
}

/// Pitch and bank as stored by the simulator: negative pitch is nose up,
/// negative bank is right wing down. Use [`Angle::signed`] to read them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub pitch: Angle,
    pub bank: Angle,
}

/// Everything read from the simulator in one polling instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub radios: Radios,
    pub position: Position,
    pub flaps_deg: f64,
    pub on_ground: bool,
    pub parking_brake: bool,
    pub altitude: Altitude,
    pub spoilers_armed: bool,
    pub autopilot: Autopilot,
    pub heading_true: Angle,
    pub magnetic_variation: Angle,
    pub heading_magnetic: Angle,
    pub transponder: Squawk,
    pub airspeed: Airspeed,
    pub autobrake: Autobrake,
    pub next_waypoint: Waypoint,
    pub destination: Destination,
    pub attitude: Attitude,
}

/// Text notification the simulator posted through its message block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimConnectMessage {
    pub changed: u32,
    pub kind: u32,
    pub duration_s: u32,
    pub event_id: u32,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Airborne,
    ParkingBrake,
    Flaps,
    Com1,
    SpoilersArmed,
    ApAltitudeTarget,
    Transponder,
    NextWaypoint,
    Autobrake,
    YawDamper,
    Toga,
    Autothrottle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Flag(bool),
    Degrees(f64),
    Frequency(f64),
    Feet(i64),
    Squawk(Squawk),
    Autobrake(Autobrake),
    Waypoint(Waypoint),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Policy {
    Immediate,
    AfterSettle,
    Suppressed,
}

/// One tracked field moving from its last known value to a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: Field,
    /// `None` the first time the field is observed.
    pub old: Option<FieldValue>,
    pub new: FieldValue,
    pub policy: Policy,
}

impl FieldChange {
    pub fn is_announced(&self) -> bool {
        self.policy != Policy::Suppressed
    }
}

/// Hotkey requests sort ahead of periodic ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Hotkey,
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Instruments,
    SimConnect,
    FlightFollowing,
    Hotkey,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRequest {
    pub text: String,
    pub priority: Priority,
    pub source: Source,
}

impl AnnouncementRequest {
    pub fn periodic(source: Source, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::Periodic,
            source,
        }
    }

    pub fn hotkey(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: Priority::Hotkey,
            source: Source::Hotkey,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_wraps_into_compass_range() {
        assert_eq!(Angle::from_degrees(370.0).degrees(), 10.0);
        assert_eq!(Angle::from_degrees(-90.0).degrees(), 270.0);
        assert_eq!(Angle::from_degrees(-1e-20).degrees(), 0.0);
    }

    #[test]
    fn signed_angle_recovers_negative_pitch() {
        let pitch = Angle::from_degrees(-5.5);
        assert!((pitch.signed() + 5.5).abs() < 1e-9);
    }

    #[test]
    fn whole_degrees_folds_north() {
        assert_eq!(Angle::from_degrees(359.7).whole_degrees(), 0);
        assert_eq!(Angle::from_degrees(89.4).whole_degrees(), 89);
    }

    #[test]
    fn squawk_reads_as_four_digits() {
        assert_eq!(Squawk(0x1200).to_string(), "1200");
        assert_eq!(Squawk(0x0200).to_string(), "0200");
    }

    #[test]
    fn autobrake_raw_mapping() {
        assert_eq!(Autobrake::from_raw(0), Autobrake::Rto);
        assert_eq!(Autobrake::from_raw(3), Autobrake::Position(2));
        assert_eq!(Autobrake::from_raw(5), Autobrake::Max);
        assert_eq!(Autobrake::from_raw(9), Autobrake::Unknown(9));
    }

    #[test]
    fn hotkey_priority_sorts_first() {
        assert!(Priority::Hotkey < Priority::Periodic);
    }

    #[test]
    fn request_serializes_with_snake_case_source() {
        let req = AnnouncementRequest::periodic(Source::FlightFollowing, "Closest city");
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"flight_following\""));
    }
}
