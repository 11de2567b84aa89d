//! Raw schema values -> typed snapshots.
//!
//! Pure functions: the only environmental input, the local UTC offset used
//! for ETA clock strings, is passed in by the caller.

use crate::error::DecodeError;
use crate::schema::{RawValue, ATTITUDE, GENERAL, SIMCONNECT};
use chrono::{DateTime, FixedOffset};
use flightfollowing_shared::{
    Airspeed, Altitude, Angle, Attitude, Autobrake, Autopilot, Destination, InstrumentSnapshot,
    Position, Radios, SimConnectMessage, Squawk, Waypoint,
};

const TWO_POW_32: f64 = 65536.0 * 65536.0;
const METRES_TO_FEET: f64 = 3.28084;

/// 32-bit fixed-point angle: degrees * 65536^2 / 360.
pub fn angle_from_raw(raw: i64) -> Angle {
    Angle::from_degrees(raw as f64 * 360.0 / TWO_POW_32)
}

pub fn latitude_from_raw(raw: i64) -> f64 {
    raw as f64 * (90.0 / (10_001_750.0 * TWO_POW_32))
}

pub fn longitude_from_raw(raw: i64) -> f64 {
    raw as f64 * (360.0 / (TWO_POW_32 * TWO_POW_32))
}

/// Autopilot altitude target, metres * 65536 -> feet.
pub fn altitude_target_ft(raw: u64) -> f64 {
    raw as f64 / 65536.0 * METRES_TO_FEET
}

/// COM frequency display decode: BCD nibbles `2280` read as "122.80".
pub fn frequency_from_bcd(raw: u16) -> Result<f64, DecodeError> {
    let digits = format!("{raw:04x}");
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidBcd { raw: raw as u64 });
    }
    format!("1{}.{}", &digits[..2], &digits[2..])
        .parse::<f64>()
        .map_err(|_| DecodeError::InvalidBcd { raw: raw as u64 })
}

/// Seconds since the epoch -> "HH:MM" at the given offset.
pub fn clock_time(secs: u64, offset: FixedOffset) -> String {
    match DateTime::from_timestamp(secs as i64, 0) {
        Some(t) => t.with_timezone(&offset).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Positional accessor that turns a wrong variant into a decode error.
struct Values<'a>(&'a [RawValue]);

impl<'a> Values<'a> {
    fn checked(values: &'a [RawValue], expected: usize) -> Result<Self, DecodeError> {
        if values.len() < expected {
            return Err(DecodeError::ShortRead {
                expected,
                got: values.len(),
            });
        }
        Ok(Values(values))
    }

    fn int(&self, index: usize) -> Result<i64, DecodeError> {
        match self.0[index] {
            RawValue::Int(v) => Ok(v),
            _ => Err(DecodeError::TypeMismatch {
                index,
                expected: "signed integer",
            }),
        }
    }

    fn uint(&self, index: usize) -> Result<u64, DecodeError> {
        match self.0[index] {
            RawValue::UInt(v) => Ok(v),
            _ => Err(DecodeError::TypeMismatch {
                index,
                expected: "unsigned integer",
            }),
        }
    }

    fn float(&self, index: usize) -> Result<f64, DecodeError> {
        match self.0[index] {
            RawValue::Float(v) => Ok(v),
            _ => Err(DecodeError::TypeMismatch {
                index,
                expected: "float",
            }),
        }
    }

    fn text(&self, index: usize) -> Result<String, DecodeError> {
        match &self.0[index] {
            RawValue::Text(v) => Ok(v.trim().to_string()),
            _ => Err(DecodeError::TypeMismatch {
                index,
                expected: "text",
            }),
        }
    }

    fn bytes(&self, index: usize) -> Result<&'a [u8], DecodeError> {
        match &self.0[index] {
            RawValue::Bytes(v) => Ok(v),
            _ => Err(DecodeError::TypeMismatch {
                index,
                expected: "bytes",
            }),
        }
    }

    fn flag(&self, index: usize) -> Result<bool, DecodeError> {
        match self.0[index] {
            RawValue::Int(v) => Ok(v != 0),
            RawValue::UInt(v) => Ok(v != 0),
            _ => Err(DecodeError::TypeMismatch {
                index,
                expected: "integer flag",
            }),
        }
    }
}

pub fn decode_attitude(raw: &[RawValue]) -> Result<Attitude, DecodeError> {
    let v = Values::checked(raw, ATTITUDE.entries.len())?;
    Ok(Attitude {
        pitch: angle_from_raw(v.int(0)?),
        bank: angle_from_raw(v.int(1)?),
    })
}

/// Build one snapshot from the general and attitude groups.
pub fn decode_instruments(
    general: &[RawValue],
    attitude: &[RawValue],
    utc_offset: FixedOffset,
) -> Result<InstrumentSnapshot, DecodeError> {
    let v = Values::checked(general, GENERAL.entries.len())?;

    let heading_raw = v.uint(19)? as i64;
    let variation_raw = v.int(20)?;

    Ok(InstrumentSnapshot {
        radios: Radios {
            com1_mhz: frequency_from_bcd(v.uint(0)? as u16)?,
            com2_mhz: frequency_from_bcd(v.uint(1)? as u16)?,
            active_flags: v.uint(2)? as u8,
        },
        position: Position {
            latitude: latitude_from_raw(v.int(3)?),
            longitude: longitude_from_raw(v.int(4)?),
        },
        flaps_deg: v.int(5)? as f64 / 256.0,
        on_ground: v.flag(6)?,
        parking_brake: v.flag(7)?,
        altitude: Altitude {
            asl_ft: v.int(8)?,
            ground_ft: v.uint(9)? as f64 / 256.0 * METRES_TO_FEET,
        },
        spoilers_armed: v.uint(10)? == 1,
        autopilot: Autopilot {
            master: v.flag(11)?,
            nav_lock: v.flag(12)?,
            heading_lock: v.flag(13)?,
            heading_target: Angle::from_degrees((v.uint(14)? as f64 / 65536.0 * 360.0).round()),
            altitude_lock: v.flag(15)?,
            altitude_target_ft: altitude_target_ft(v.uint(16)?),
            airspeed_hold: v.flag(17)?,
            airspeed_target_kt: v.int(18)? as i16,
            yaw_damper: v.flag(28)?,
            toga: v.flag(29)?,
            autothrottle: v.flag(30)?,
        },
        heading_true: angle_from_raw(heading_raw),
        magnetic_variation: Angle::from_degrees(variation_raw as f64 * 360.0 / 65536.0),
        heading_magnetic: angle_from_raw(heading_raw - variation_raw * 65536),
        transponder: Squawk(v.uint(21)? as u16),
        airspeed: Airspeed {
            indicated_kt: (v.uint(27)? as f64 / 128.0).round() as i64,
            true_kt: (v.uint(26)? as f64 / 128.0).round() as i64,
            mach: v.int(31)? as f64 / 20480.0,
        },
        autobrake: Autobrake::from_raw(v.uint(25)? as u8),
        next_waypoint: Waypoint {
            name: v.text(23)?,
            distance_m: v.float(22)?,
            bearing: Angle::from_degrees(v.float(33)?.to_degrees()),
            time_enroute_s: v.uint(24)? as u32,
            eta: clock_time(v.uint(32)?, utc_offset),
        },
        destination: Destination {
            id: v.text(34)?,
            time_enroute_s: v.uint(35)? as u32,
            eta: clock_time(v.uint(36)?, utc_offset),
            route_distance_m: v.float(37)?,
            fuel_burn_gal: v.float(38)?,
        },
        attitude: decode_attitude(attitude)?,
    })
}

/// Message block -> lines. Text is cut at the reported length and split on NUL.
pub fn decode_simconnect(raw: &[RawValue]) -> Result<SimConnectMessage, DecodeError> {
    let v = Values::checked(raw, SIMCONNECT.entries.len())?;
    let text = v.bytes(5)?;
    let len = (v.uint(4)? as usize).min(text.len());

    let lines = text[..len]
        .split(|&b| b == 0)
        .map(|chunk| chunk.iter().map(|&b| b as char).collect::<String>())
        .filter(|line| !line.trim().is_empty())
        .collect();

    Ok(SimConnectMessage {
        changed: v.uint(0)? as u32,
        kind: v.uint(1)? as u32,
        duration_s: v.uint(2)? as u32,
        event_id: v.uint(3)? as u32,
        lines,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A general block describing a parked aircraft, in schema order.
    pub(crate) fn general_block() -> Vec<RawValue> {
        use RawValue::*;
        vec![
            UInt(0x2280),                 // com1 122.80
            UInt(0x1900),                 // com2 119.00
            UInt(0),
            Int(4_457_000_000_000_000),   // ~40.6 N
            Int(-3_400_000_000_000_000_000), // ~-66 E
            Int(0),                       // flaps
            Int(1),                       // on ground
            Int(32767),                   // parking brake
            Int(13),                      // altitude ft
            UInt(1024),                   // ground 4 m
            UInt(0),
            UInt(0),
            UInt(0),
            UInt(0),
            UInt(16384),                  // AP heading 90
            UInt(0),
            UInt(3048 * 65536),           // AP altitude 10000 ft
            UInt(0),
            Int(250),
            UInt(0x4000_0000),            // true heading 90
            Int(-2366),                   // ~13 W
            UInt(0x1200),
            Float(12_000.0),
            Text("DPK".to_string()),
            UInt(600),
            UInt(1),
            UInt(0),
            UInt(0),
            UInt(0),
            UInt(0),
            UInt(0),
            Int(0),
            UInt(3_600),
            Float(std::f64::consts::FRAC_PI_2),
            Text("KBOS".to_string()),
            UInt(5_400),
            UInt(7_200),
            Float(300_000.0),
            Float(120.0),
        ]
    }

    pub(crate) fn attitude_block(pitch_raw: i64) -> Vec<RawValue> {
        vec![RawValue::Int(pitch_raw), RawValue::Int(0)]
    }

    pub(crate) fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn heading_word_decodes_with_documented_formula() {
        let raw: i64 = 0x5A00_0000;
        let expected = raw as f64 * 360.0 / (65536.0 * 65536.0);
        assert!((angle_from_raw(raw).degrees() - expected).abs() < 1e-9);
        assert!((expected - 126.5625).abs() < 1e-9);
    }

    #[test]
    fn angles_wrap_into_compass_range() {
        let a = angle_from_raw(-(0x4000_0000_i64));
        assert!((a.degrees() - 270.0).abs() < 1e-9);
        assert!(angle_from_raw(0x1_0000_0000).degrees() < 360.0);
    }

    #[test]
    fn bcd_frequency_is_a_display_decode() {
        assert_eq!(frequency_from_bcd(0x2280).unwrap(), 122.8);
        assert_eq!(frequency_from_bcd(0x0800).unwrap(), 108.0);
        assert_eq!(frequency_from_bcd(0x1855).unwrap(), 118.55);
        assert_eq!(
            frequency_from_bcd(0x12AB),
            Err(DecodeError::InvalidBcd { raw: 0x12AB })
        );
    }

    #[test]
    fn position_scale_factors() {
        let lat = latitude_from_raw(10_001_750 * 65536 * 65536);
        assert!((lat - 90.0).abs() < 1e-9);
        let lon = longitude_from_raw(i64::MIN / 2);
        assert!((lon + 90.0).abs() < 1e-9);
    }

    #[test]
    fn altitude_target_converts_metres_to_feet() {
        assert!((altitude_target_ft(3048 * 65536) - 10_000.0).abs() < 0.1);
    }

    #[test]
    fn eta_renders_wall_clock() {
        assert_eq!(clock_time(3_600 + 5 * 60, utc()), "01:05");
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(clock_time(0, plus_two), "02:00");
    }

    #[test]
    fn full_block_decodes() {
        let snap = decode_instruments(&general_block(), &attitude_block(0), utc()).unwrap();
        assert_eq!(snap.radios.com1_mhz, 122.8);
        assert!(snap.on_ground);
        assert!(snap.parking_brake);
        assert_eq!(snap.transponder, Squawk(0x1200));
        assert_eq!(snap.autopilot.heading_target.whole_degrees(), 90);
        assert!((snap.heading_true.degrees() - 90.0).abs() < 1e-9);
        assert!(snap.heading_magnetic.degrees() > 90.0);
        assert_eq!(snap.next_waypoint.name, "DPK");
        assert_eq!(snap.next_waypoint.bearing.whole_degrees(), 90);
        assert_eq!(snap.next_waypoint.eta, "01:00");
        assert_eq!(snap.destination.eta, "02:00");
        assert_eq!(snap.autobrake, Autobrake::Off);
        assert!((snap.altitude.ground_ft - 4.0 * 3.28084).abs() < 1e-9);
    }

    #[test]
    fn short_read_is_rejected() {
        let mut block = general_block();
        block.truncate(10);
        assert_eq!(
            decode_instruments(&block, &attitude_block(0), utc()),
            Err(DecodeError::ShortRead {
                expected: 39,
                got: 10
            })
        );
    }

    #[test]
    fn wrong_variant_is_rejected() {
        let mut block = general_block();
        block[22] = RawValue::UInt(5);
        assert!(matches!(
            decode_instruments(&block, &attitude_block(0), utc()),
            Err(DecodeError::TypeMismatch { index: 22, .. })
        ));
    }

    #[test]
    fn simconnect_block_splits_on_nul() {
        let mut text = b"ATC\0Cleared to land\0runway 27\0\0".to_vec();
        let len = text.len() as u64;
        text.resize(2028, 0);
        let raw = vec![
            RawValue::UInt(3),
            RawValue::UInt(1),
            RawValue::UInt(10),
            RawValue::UInt(0),
            RawValue::UInt(len),
            RawValue::Bytes(text),
        ];
        let msg = decode_simconnect(&raw).unwrap();
        assert_eq!(msg.changed, 3);
        assert_eq!(msg.lines, vec!["ATC", "Cleared to land", "runway 27"]);
    }
}
