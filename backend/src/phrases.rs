//! Everything the pilot hears is worded here.

use flightfollowing_shared::{
    Autobrake, Destination, Field, FieldChange, FieldValue, InstrumentSnapshot, Waypoint,
};

pub const NO_DATA: &str = "No instrument data yet.";
const KM_PER_MILE: f64 = 1.609;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceUnits {
    #[default]
    Kilometres,
    Miles,
}

impl DistanceUnits {
    pub fn from_km(self, km: f64) -> f64 {
        match self {
            DistanceUnits::Kilometres => km,
            DistanceUnits::Miles => km / KM_PER_MILE,
        }
    }

    pub fn spoken(self) -> &'static str {
        match self {
            DistanceUnits::Kilometres => "kilometers",
            DistanceUnits::Miles => "miles",
        }
    }
}

/// Instruments that can be read out on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readout {
    AltitudeAsl,
    AltitudeAgl,
    Heading,
    TrueAirspeed,
    IndicatedAirspeed,
    Mach,
    Waypoint,
    Destination,
}

/// "1 hour, 5 minutes". Zero yields an empty string.
pub fn duration_to_text(secs: u64) -> String {
    let units = [
        (secs / 86_400, "day"),
        (secs % 86_400 / 3_600, "hour"),
        (secs % 3_600 / 60, "minute"),
        (secs % 60, "second"),
    ];
    units
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}{}", if *n == 1 { "" } else { "s" }))
        .collect::<Vec<_>>()
        .join(", ")
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

fn autobrake_text(setting: Autobrake) -> String {
    match setting {
        Autobrake::Rto => "R T O".to_string(),
        Autobrake::Off => "off".to_string(),
        Autobrake::Position(n) => format!("position {n}"),
        Autobrake::Max => "maximum".to_string(),
        Autobrake::Unknown(raw) => format!("setting {raw}"),
    }
}

/// Utterances for one detected change. Suppressed changes say nothing.
pub fn change_phrases(change: &FieldChange, units: DistanceUnits) -> Vec<String> {
    if !change.is_announced() {
        return Vec::new();
    }
    let text = match (change.field, &change.new) {
        (Field::Airborne, _) => "Positive rate.".to_string(),
        (Field::ParkingBrake, FieldValue::Flag(on)) => format!("parking brake {}.", on_off(*on)),
        (Field::Flaps, FieldValue::Degrees(deg)) => format!("Flaps {deg:.0}"),
        (Field::Com1, FieldValue::Frequency(mhz)) => format!("com 1, {mhz}"),
        (Field::SpoilersArmed, _) => "spoilers armed.".to_string(),
        (Field::ApAltitudeTarget, FieldValue::Feet(ft)) => format!("Altitude set to {ft}"),
        (Field::Transponder, FieldValue::Squawk(code)) => format!("Squawk {code}"),
        (Field::NextWaypoint, FieldValue::Waypoint(wp)) => return waypoint_phrases(wp, units, false),
        (Field::Autobrake, FieldValue::Autobrake(setting)) => {
            format!("Auto brake {}", autobrake_text(*setting))
        }
        (Field::YawDamper, FieldValue::Flag(on)) => format!("yaw damper {}", on_off(*on)),
        (Field::Toga, FieldValue::Flag(on)) => format!("TOGA {}", on_off(*on)),
        (Field::Autothrottle, FieldValue::Flag(on)) => {
            format!("Auto Throttle {}", if *on { "armed" } else { "off" })
        }
        (field, value) => {
            tracing::warn!(?field, ?value, "no phrase for change");
            return Vec::new();
        }
    };
    vec![text]
}

/// Next waypoint: identity and distance, bearing, then time to go.
pub fn waypoint_phrases(wp: &Waypoint, units: DistanceUnits, with_eta: bool) -> Vec<String> {
    let distance = units.from_km(wp.distance_m / 1000.0);
    let mut out = vec![
        format!(
            "Next waypoint: {}, distance: {distance:.1} {}",
            wp.name,
            units.spoken()
        ),
        format!("bearing: {}", wp.bearing.whole_degrees()),
    ];
    let enroute = duration_to_text(wp.time_enroute_s as u64);
    if !enroute.is_empty() {
        out.push(enroute);
    }
    if with_eta {
        out.push(format!("ETA: {}", wp.eta));
    }
    out
}

fn destination_phrase(dest: &Destination) -> String {
    format!(
        "Time enroute {}. {}",
        duration_to_text(dest.time_enroute_s as u64),
        dest.eta
    )
}

/// On-demand readout of one instrument.
pub fn readout(kind: Readout, snap: Option<&InstrumentSnapshot>, units: DistanceUnits) -> Vec<String> {
    let Some(snap) = snap else {
        return vec![NO_DATA.to_string()];
    };
    let text = match kind {
        Readout::AltitudeAsl => format!("{} feet A S L", snap.altitude.asl_ft),
        Readout::AltitudeAgl => format!("{} feet A G L", snap.altitude.agl_ft()),
        Readout::Heading => format!("Heading: {}", snap.heading_magnetic.whole_degrees()),
        Readout::TrueAirspeed => format!("{} knots true", snap.airspeed.true_kt),
        Readout::IndicatedAirspeed => format!("{} knots indicated", snap.airspeed.indicated_kt),
        Readout::Mach => format!("Mach {:.2}", snap.airspeed.mach),
        Readout::Waypoint => return waypoint_phrases(&snap.next_waypoint, units, true),
        Readout::Destination => destination_phrase(&snap.destination),
    };
    vec![text]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry_decode::decode_instruments;
    use crate::telemetry_decode::tests::{attitude_block, general_block, utc};
    use flightfollowing_shared::{Angle, Policy, Squawk};

    fn change(field: Field, new: FieldValue) -> FieldChange {
        FieldChange {
            field,
            old: None,
            new,
            policy: Policy::Immediate,
        }
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(duration_to_text(0), "");
        assert_eq!(duration_to_text(61), "1 minute, 1 second");
        assert_eq!(duration_to_text(3_900), "1 hour, 5 minutes");
        assert_eq!(duration_to_text(2 * 86_400 + 7_200), "2 days, 2 hours");
    }

    #[test]
    fn field_phrases() {
        let units = DistanceUnits::Kilometres;
        let cases = [
            (change(Field::Transponder, FieldValue::Squawk(Squawk(0x1200))), "Squawk 1200"),
            (change(Field::Com1, FieldValue::Frequency(118.55)), "com 1, 118.55"),
            (change(Field::Flaps, FieldValue::Degrees(15.0)), "Flaps 15"),
            (change(Field::ApAltitudeTarget, FieldValue::Feet(10_000)), "Altitude set to 10000"),
            (change(Field::ParkingBrake, FieldValue::Flag(false)), "parking brake off."),
            (change(Field::Autobrake, FieldValue::Autobrake(Autobrake::Rto)), "Auto brake R T O"),
            (
                change(Field::Autobrake, FieldValue::Autobrake(Autobrake::Position(2))),
                "Auto brake position 2",
            ),
            (change(Field::Autothrottle, FieldValue::Flag(true)), "Auto Throttle armed"),
            (change(Field::Toga, FieldValue::Flag(false)), "TOGA off"),
            (change(Field::Airborne, FieldValue::Flag(true)), "Positive rate."),
        ];
        for (change, expected) in cases {
            assert_eq!(change_phrases(&change, units), vec![expected.to_string()]);
        }
    }

    #[test]
    fn suppressed_changes_are_silent() {
        let mut c = change(Field::SpoilersArmed, FieldValue::Flag(false));
        c.policy = Policy::Suppressed;
        assert!(change_phrases(&c, DistanceUnits::Kilometres).is_empty());
    }

    #[test]
    fn waypoint_announcement_in_miles_with_eta() {
        let wp = Waypoint {
            name: "MERIT".to_string(),
            distance_m: 16_090.0,
            bearing: Angle::from_degrees(271.6),
            time_enroute_s: 300,
            eta: "14:05".to_string(),
        };
        assert_eq!(
            waypoint_phrases(&wp, DistanceUnits::Miles, true),
            vec![
                "Next waypoint: MERIT, distance: 10.0 miles",
                "bearing: 272",
                "5 minutes",
                "ETA: 14:05",
            ]
        );
    }

    #[test]
    fn readouts_from_snapshot() {
        let snap = decode_instruments(&general_block(), &attitude_block(0), utc()).unwrap();
        let units = DistanceUnits::Kilometres;
        assert_eq!(readout(Readout::AltitudeAsl, Some(&snap), units), vec!["13 feet A S L"]);
        assert_eq!(readout(Readout::AltitudeAgl, Some(&snap), units), vec!["0 feet A G L"]);
        assert_eq!(readout(Readout::Heading, Some(&snap), units), vec!["Heading: 103"]);
        assert_eq!(
            readout(Readout::Destination, Some(&snap), units),
            vec!["Time enroute 1 hour, 30 minutes. 02:00"]
        );
    }

    #[test]
    fn readout_without_data() {
        assert_eq!(
            readout(Readout::Mach, None, DistanceUnits::Miles),
            vec![NO_DATA.to_string()]
        );
    }
}
