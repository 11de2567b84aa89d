//! Simulated aircraft used when no telemetry bridge is reachable.
//!
//! Walks through a short departure: parked, taxi, take-off, flap retraction,
//! climb with a few waypoint changes. Values are produced in the simulator's
//! raw encoding so the whole decode path is exercised.

use crate::error::{ConnectivityError, ReadError};
use crate::schema::{RawValue, Schema, SIMCONNECT_TEXT_LEN};
use rand::RngExt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const BASE_LAT: f64 = 42.3656;
const BASE_LON: f64 = -71.0096;

const WAYPOINTS: [&str; 4] = ["BOSOX", "MERIT", "HFD", "DPK"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Parked,
    Taxi,
    TakeoffRoll,
    Climb,
    Cruise,
}

#[derive(Debug)]
struct FlightSimState {
    phase: Phase,
    altitude_ft: f64,
    ias_kt: f64,
    flaps_deg: f64,
    flaps_target_deg: f64,
    heading_deg: f64,
    lat: f64,
    lon: f64,
    squawk: u16,
    waypoint_idx: usize,
    message_counter: u32,
    message: String,
}

impl FlightSimState {
    fn new() -> Self {
        Self {
            phase: Phase::Parked,
            altitude_ft: 20.0,
            ias_kt: 0.0,
            flaps_deg: 0.0,
            flaps_target_deg: 0.0,
            heading_deg: 270.0,
            lat: BASE_LAT,
            lon: BASE_LON,
            squawk: 0x1200,
            waypoint_idx: 0,
            message_counter: 0,
            message: String::new(),
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        self.phase = phase;
        match phase {
            Phase::Taxi => {
                self.flaps_target_deg = 15.0;
                self.squawk = 0x4512;
                self.post_message("Boston Ground\0Taxi to runway 27 via B");
            }
            Phase::TakeoffRoll => self.post_message("Boston Tower\0Cleared for take-off runway 27"),
            Phase::Climb => self.flaps_target_deg = 0.0,
            Phase::Cruise => self.post_message("Boston Center\0Climb and maintain flight level 240"),
            Phase::Parked => {}
        }
    }

    fn post_message(&mut self, text: &str) {
        self.message_counter = self.message_counter.wrapping_add(1);
        self.message = text.to_string();
    }

    fn update(&mut self, t: f64) {
        let phase = if t < 15.0 {
            Phase::Parked
        } else if t < 45.0 {
            Phase::Taxi
        } else if t < 65.0 {
            Phase::TakeoffRoll
        } else if t < 240.0 {
            Phase::Climb
        } else {
            Phase::Cruise
        };
        self.set_phase(phase);

        // flaps travel at 2 degrees per read, like a slow hydraulic system
        let delta = (self.flaps_target_deg - self.flaps_deg).clamp(-2.0, 2.0);
        self.flaps_deg += delta;

        let mut rng = rand::rng();
        match self.phase {
            Phase::Parked => self.ias_kt = 0.0,
            Phase::Taxi => self.ias_kt = 12.0 + rng.random_range(-2.0..2.0),
            Phase::TakeoffRoll => self.ias_kt = (self.ias_kt + 3.0).min(150.0),
            Phase::Climb => {
                self.ias_kt = 250.0 + rng.random_range(-3.0..3.0);
                self.altitude_ft += 30.0;
            }
            Phase::Cruise => self.ias_kt = 280.0 + rng.random_range(-2.0..2.0),
        }

        if matches!(self.phase, Phase::Climb | Phase::Cruise) {
            self.lat += 0.0004;
            self.lon -= 0.0011;
            self.waypoint_idx = ((t - 65.0) / 90.0) as usize % WAYPOINTS.len();
        }
    }

    fn general_block(&self) -> Vec<RawValue> {
        use RawValue::*;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let on_ground = !matches!(self.phase, Phase::Climb | Phase::Cruise);
        let airborne_cfg = self.phase == Phase::Cruise;
        let tas_kt = self.ias_kt * (1.0 + self.altitude_ft / 50_000.0);

        vec![
            UInt(0x2180),
            UInt(0x1900),
            UInt(0),
            Int((self.lat / 90.0 * 10_001_750.0 * 65536.0 * 65536.0) as i64),
            Int((self.lon / 360.0 * 65536.0 * 65536.0 * 65536.0 * 65536.0) as i64),
            Int((self.flaps_deg * 256.0) as i64),
            Int(on_ground as i64),
            Int(if self.phase == Phase::Parked { 32767 } else { 0 }),
            Int(self.altitude_ft as i64),
            UInt(20 * 256 / 3),
            UInt(matches!(self.phase, Phase::Taxi | Phase::TakeoffRoll) as u64),
            UInt(airborne_cfg as u64),
            UInt(0),
            UInt(airborne_cfg as u64),
            UInt((self.heading_deg / 360.0 * 65536.0) as u64),
            UInt(airborne_cfg as u64),
            UInt(if airborne_cfg { 7315 * 65536 } else { 1524 * 65536 }),
            UInt(0),
            Int(250),
            UInt((self.heading_deg / 360.0 * 65536.0 * 65536.0) as u64),
            Int(-2548),
            UInt(self.squawk as u64),
            Float(42_000.0 - self.altitude_ft),
            Text(WAYPOINTS[self.waypoint_idx].to_string()),
            UInt(720),
            UInt(if on_ground { 0 } else { 1 }),
            UInt((tas_kt * 128.0) as u64),
            UInt((self.ias_kt * 128.0) as u64),
            UInt(airborne_cfg as u64),
            UInt(0),
            UInt(airborne_cfg as u64),
            Int((tas_kt / 661.0 * 20480.0) as i64),
            UInt(now + 720),
            Float(self.heading_deg.to_radians()),
            Text("KJFK".to_string()),
            UInt(3_300),
            UInt(now + 3_300),
            Float(301_000.0),
            Float(310.0),
        ]
    }

    fn attitude_block(&self) -> Vec<RawValue> {
        let pitch_deg: f64 = match self.phase {
            Phase::Climb => -7.5,
            Phase::TakeoffRoll if self.ias_kt > 130.0 => -4.0,
            _ => 0.0,
        };
        vec![
            RawValue::Int((pitch_deg / 360.0 * 65536.0 * 65536.0) as i64),
            RawValue::Int(0),
        ]
    }

    fn simconnect_block(&self) -> Vec<RawValue> {
        let mut text = self.message.as_bytes().to_vec();
        let len = text.len() as u64;
        text.resize(SIMCONNECT_TEXT_LEN as usize, 0);
        vec![
            RawValue::UInt(self.message_counter as u64),
            RawValue::UInt(1),
            RawValue::UInt(10),
            RawValue::UInt(0),
            RawValue::UInt(len),
            RawValue::Bytes(text),
        ]
    }
}

pub struct SimulatedSource {
    started: Instant,
    state: FlightSimState,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            state: FlightSimState::new(),
        }
    }
}

impl crate::telemetry_source::TelemetrySource for SimulatedSource {
    fn open(&mut self) -> Result<(), ConnectivityError> {
        self.started = Instant::now();
        Ok(())
    }

    fn read(&mut self, schema: &Schema) -> Result<Vec<RawValue>, ReadError> {
        match schema.name {
            "general" => {
                self.state.update(self.started.elapsed().as_secs_f64());
                Ok(self.state.general_block())
            }
            "attitude" => Ok(self.state.attitude_block()),
            "simconnect" => Ok(self.state.simconnect_block()),
            _ => Ok(Vec::new()),
        }
    }

    fn close(&mut self) {}

    fn name(&self) -> &str {
        "simulated aircraft"
    }
}
