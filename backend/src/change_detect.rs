//! Per-field change detection between consecutive instrument snapshots.
//!
//! Each tracked field has its own small state machine. Most fields announce
//! the moment they differ from the last seen value; flaps must hold still
//! for two consecutive samples; the next-waypoint name waits a few seconds
//! for the flight plan data behind it to catch up.

use flightfollowing_shared::{
    Autobrake, Field, FieldChange, FieldValue, InstrumentSnapshot, Policy, Squawk,
};
use std::time::{Duration, Instant};

/// Fast re-poll interval while a settling field is still moving.
pub const SETTLE_REPOLL: Duration = Duration::from_millis(200);
/// Equal consecutive samples needed before a settling field is announced.
pub const SETTLE_SAMPLES: u8 = 2;
/// Delay between a waypoint name change and its announcement.
pub const WAYPOINT_DELAY: Duration = Duration::from_secs(3);

/// Result of one detection cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleOutcome {
    pub changes: Vec<FieldChange>,
    /// Set when a field is mid-transition and wants a fresh sample sooner
    /// than the regular polling cadence.
    pub repoll_after: Option<Duration>,
}

impl CycleOutcome {
    pub fn announced(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter().filter(|c| c.is_announced())
    }
}

// ----------------------------------------------------------------------
//  Immediate fields
// ----------------------------------------------------------------------

/// Last seen value of an immediate-diff field. `None` until first observed.
#[derive(Debug, Clone, PartialEq)]
struct Tracked<T> {
    last: Option<T>,
}

impl<T: Clone + PartialEq> Tracked<T> {
    fn unknown() -> Self {
        Self { last: None }
    }

    fn known(value: T) -> Self {
        Self { last: Some(value) }
    }

    /// Store `value`; returns the previous value when it differs.
    fn update(&mut self, value: T) -> Option<Option<T>> {
        if self.last.as_ref() == Some(&value) {
            return None;
        }
        Some(self.last.replace(value))
    }
}

// ----------------------------------------------------------------------
//  Settling fields
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum SettleState {
    Idle,
    Settling { candidate: f64, seen: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SettleStep {
    Unchanged,
    Moving,
    Settled { old: f64, new: f64 },
}

#[derive(Debug, Clone, PartialEq)]
struct SettlingField {
    settled: f64,
    state: SettleState,
}

impl SettlingField {
    fn new(initial: f64) -> Self {
        Self {
            settled: initial,
            state: SettleState::Idle,
        }
    }

    fn observe(&mut self, value: f64) -> SettleStep {
        let state = self.state;
        match state {
            SettleState::Idle if value == self.settled => SettleStep::Unchanged,
            SettleState::Settling { candidate, seen } if value == candidate => {
                let seen = seen + 1;
                if seen < SETTLE_SAMPLES {
                    self.state = SettleState::Settling { candidate, seen };
                    return SettleStep::Moving;
                }
                self.state = SettleState::Idle;
                if candidate == self.settled {
                    // moved and came back to where it started
                    return SettleStep::Unchanged;
                }
                let old = std::mem::replace(&mut self.settled, candidate);
                SettleStep::Settled {
                    old,
                    new: candidate,
                }
            }
            _ => {
                self.state = SettleState::Settling {
                    candidate: value,
                    seen: 1,
                };
                SettleStep::Moving
            }
        }
    }
}

// ----------------------------------------------------------------------
//  Airborne latch
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AirborneLatch {
    /// No on-ground sample seen yet this session.
    Unknown,
    OnGround,
    /// Terminal: only fires once per session.
    Airborne,
}

impl AirborneLatch {
    fn observe(&mut self, on_ground: bool) -> bool {
        match (*self, on_ground) {
            (AirborneLatch::Unknown, true) => {
                *self = AirborneLatch::OnGround;
                false
            }
            (AirborneLatch::OnGround, false) => {
                *self = AirborneLatch::Airborne;
                true
            }
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------
//  Waypoint tracker
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct PendingWaypoint {
    name: String,
    due: Instant,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct WaypointTracker {
    announced: Option<String>,
    pending: Option<PendingWaypoint>,
}

impl WaypointTracker {
    fn observe(&mut self, current: &InstrumentSnapshot, now: Instant) -> Option<FieldChange> {
        let name = &current.next_waypoint.name;

        let target_changed = match &self.pending {
            Some(p) => &p.name != name,
            None => self.announced.as_ref() != Some(name),
        };
        if target_changed {
            if self.announced.as_ref() == Some(name) {
                // sequenced away and straight back before the delay ran out
                self.pending = None;
                return None;
            }
            if name.is_empty() {
                let old = self.announced.replace(String::new());
                self.pending = None;
                return Some(FieldChange {
                    field: Field::NextWaypoint,
                    old: old.map(|n| FieldValue::Waypoint(named(n))),
                    new: FieldValue::Waypoint(current.next_waypoint.clone()),
                    policy: Policy::Suppressed,
                });
            }
            self.pending = Some(PendingWaypoint {
                name: name.clone(),
                due: now + WAYPOINT_DELAY,
            });
            return None;
        }

        let due = self.pending.as_ref().is_some_and(|p| now >= p.due);
        if !due {
            return None;
        }
        self.pending = None;
        let old = self.announced.replace(name.clone());
        Some(FieldChange {
            field: Field::NextWaypoint,
            old: old.map(|n| FieldValue::Waypoint(named(n))),
            new: FieldValue::Waypoint(current.next_waypoint.clone()),
            policy: Policy::AfterSettle,
        })
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

fn named(name: String) -> flightfollowing_shared::Waypoint {
    flightfollowing_shared::Waypoint {
        name,
        ..Default::default()
    }
}

// ----------------------------------------------------------------------
//  Tracked field set
// ----------------------------------------------------------------------

/// Last seen value of every announced instrument field.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFields {
    airborne: AirborneLatch,
    parking_brake: Tracked<bool>,
    flaps: SettlingField,
    com1: Tracked<f64>,
    spoilers_armed: Tracked<bool>,
    ap_altitude_ft: Tracked<i64>,
    transponder: Tracked<Squawk>,
    waypoint: WaypointTracker,
    autobrake: Tracked<Autobrake>,
    yaw_damper: Tracked<bool>,
    toga: Tracked<bool>,
    autothrottle: Tracked<bool>,
}

impl Default for TrackedFields {
    fn default() -> Self {
        Self {
            airborne: AirborneLatch::Unknown,
            // a parked aircraft is assumed, so a set brake is not news
            parking_brake: Tracked::known(true),
            flaps: SettlingField::new(0.0),
            com1: Tracked::unknown(),
            spoilers_armed: Tracked::unknown(),
            ap_altitude_ft: Tracked::unknown(),
            transponder: Tracked::unknown(),
            waypoint: WaypointTracker::default(),
            autobrake: Tracked::unknown(),
            yaw_damper: Tracked::unknown(),
            toga: Tracked::unknown(),
            autothrottle: Tracked::unknown(),
        }
    }
}

#[cfg(test)]
impl TrackedFields {
    pub fn is_airborne(&self) -> bool {
        self.airborne == AirborneLatch::Airborne
    }

    pub fn waypoint_pending(&self) -> bool {
        self.waypoint.is_pending()
    }
}

fn immediate<T: Clone>(
    out: &mut Vec<FieldChange>,
    field: Field,
    diff: Option<Option<T>>,
    wrap: impl Fn(T) -> FieldValue,
    new: T,
) {
    if let Some(old) = diff {
        out.push(FieldChange {
            field,
            old: old.map(&wrap),
            new: wrap(new),
            policy: Policy::Immediate,
        });
    }
}

/// Compare `current` against the tracked values, update them, and report
/// what changed. Called once per instrument poll and again for every
/// requested re-poll.
pub fn detect(fields: &mut TrackedFields, current: &InstrumentSnapshot, now: Instant) -> CycleOutcome {
    let mut changes = Vec::new();
    let mut repoll_after = None;

    if fields.airborne.observe(current.on_ground) {
        changes.push(FieldChange {
            field: Field::Airborne,
            old: Some(FieldValue::Flag(false)),
            new: FieldValue::Flag(true),
            policy: Policy::Immediate,
        });
    }

    immediate(
        &mut changes,
        Field::ParkingBrake,
        fields.parking_brake.update(current.parking_brake),
        FieldValue::Flag,
        current.parking_brake,
    );

    match fields.flaps.observe(current.flaps_deg) {
        SettleStep::Unchanged => {}
        SettleStep::Moving => repoll_after = Some(SETTLE_REPOLL),
        SettleStep::Settled { old, new } => changes.push(FieldChange {
            field: Field::Flaps,
            old: Some(FieldValue::Degrees(old)),
            new: FieldValue::Degrees(new),
            policy: Policy::AfterSettle,
        }),
    }

    immediate(
        &mut changes,
        Field::Com1,
        fields.com1.update(current.radios.com1_mhz),
        FieldValue::Frequency,
        current.radios.com1_mhz,
    );

    if let Some(old) = fields.spoilers_armed.update(current.spoilers_armed) {
        let policy = if current.spoilers_armed {
            Policy::Immediate
        } else {
            Policy::Suppressed
        };
        changes.push(FieldChange {
            field: Field::SpoilersArmed,
            old: old.map(FieldValue::Flag),
            new: FieldValue::Flag(current.spoilers_armed),
            policy,
        });
    }

    let ap_altitude = current.autopilot.altitude_target_ft.round() as i64;
    immediate(
        &mut changes,
        Field::ApAltitudeTarget,
        fields.ap_altitude_ft.update(ap_altitude),
        FieldValue::Feet,
        ap_altitude,
    );

    immediate(
        &mut changes,
        Field::Transponder,
        fields.transponder.update(current.transponder),
        FieldValue::Squawk,
        current.transponder,
    );

    changes.extend(fields.waypoint.observe(current, now));

    immediate(
        &mut changes,
        Field::Autobrake,
        fields.autobrake.update(current.autobrake),
        FieldValue::Autobrake,
        current.autobrake,
    );

    let ap = &current.autopilot;
    immediate(
        &mut changes,
        Field::YawDamper,
        fields.yaw_damper.update(ap.yaw_damper),
        FieldValue::Flag,
        ap.yaw_damper,
    );
    immediate(
        &mut changes,
        Field::Toga,
        fields.toga.update(ap.toga),
        FieldValue::Flag,
        ap.toga,
    );
    immediate(
        &mut changes,
        Field::Autothrottle,
        fields.autothrottle.update(ap.autothrottle),
        FieldValue::Flag,
        ap.autothrottle,
    );

    CycleOutcome {
        changes,
        repoll_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry_decode::decode_instruments;
    use crate::telemetry_decode::tests::{attitude_block, general_block, utc};

    fn parked() -> InstrumentSnapshot {
        decode_instruments(&general_block(), &attitude_block(0), utc()).unwrap()
    }

    /// Tracker that has already absorbed the parked snapshot's first-seen
    /// announcements, so tests only see what they change.
    fn primed(snap: &InstrumentSnapshot, t0: Instant) -> TrackedFields {
        let mut fields = TrackedFields::default();
        detect(&mut fields, snap, t0);
        detect(&mut fields, snap, t0 + WAYPOINT_DELAY);
        assert!(detect(&mut fields, snap, t0 + WAYPOINT_DELAY).changes.is_empty());
        fields
    }

    fn fields_of(outcome: &CycleOutcome) -> Vec<Field> {
        outcome.announced().map(|c| c.field).collect()
    }

    #[test]
    fn first_observation_announces_unknown_fields() {
        let t0 = Instant::now();
        let mut fields = TrackedFields::default();
        let outcome = detect(&mut fields, &parked(), t0);
        let announced = fields_of(&outcome);
        assert!(announced.contains(&Field::Com1));
        assert!(announced.contains(&Field::Transponder));
        assert!(announced.contains(&Field::ApAltitudeTarget));
        // brake starts out assumed on
        assert!(!announced.contains(&Field::ParkingBrake));
        // spoilers start disarmed, which is never spoken
        assert!(!announced.contains(&Field::SpoilersArmed));
    }

    #[test]
    fn transponder_change_is_immediate() {
        let t0 = Instant::now();
        let mut snap = parked();
        snap.transponder = Squawk(0x7000);
        let mut fields = primed(&snap, t0);

        snap.transponder = Squawk(0x1200);
        let outcome = detect(&mut fields, &snap, t0 + Duration::from_secs(5));
        assert_eq!(
            outcome.changes,
            vec![FieldChange {
                field: Field::Transponder,
                old: Some(FieldValue::Squawk(Squawk(0x7000))),
                new: FieldValue::Squawk(Squawk(0x1200)),
                policy: Policy::Immediate,
            }]
        );
    }

    #[test]
    fn flaps_wait_for_two_equal_samples() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.flaps_deg = 5.0;
        let moving = detect(&mut fields, &snap, t0);
        assert!(moving.changes.is_empty());
        assert_eq!(moving.repoll_after, Some(SETTLE_REPOLL));

        snap.flaps_deg = 10.0;
        let still_moving = detect(&mut fields, &snap, t0);
        assert!(still_moving.changes.is_empty());
        assert_eq!(still_moving.repoll_after, Some(SETTLE_REPOLL));

        let settled = detect(&mut fields, &snap, t0);
        assert_eq!(settled.repoll_after, None);
        assert_eq!(
            settled.changes,
            vec![FieldChange {
                field: Field::Flaps,
                old: Some(FieldValue::Degrees(0.0)),
                new: FieldValue::Degrees(10.0),
                policy: Policy::AfterSettle,
            }]
        );

        assert!(detect(&mut fields, &snap, t0).changes.is_empty());
    }

    #[test]
    fn flaps_that_return_to_start_are_not_announced() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.flaps_deg = 2.0;
        detect(&mut fields, &snap, t0);
        snap.flaps_deg = 0.0;
        assert!(detect(&mut fields, &snap, t0).changes.is_empty());
        let outcome = detect(&mut fields, &snap, t0);
        assert!(outcome.changes.is_empty());
        assert_eq!(outcome.repoll_after, None);
    }

    #[test]
    fn airborne_latch_fires_once_per_session() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.on_ground = false;
        assert_eq!(fields_of(&detect(&mut fields, &snap, t0)), vec![Field::Airborne]);
        assert!(fields.is_airborne());

        // touch and go
        snap.on_ground = true;
        assert!(detect(&mut fields, &snap, t0).changes.is_empty());
        snap.on_ground = false;
        assert!(detect(&mut fields, &snap, t0).changes.is_empty());
    }

    #[test]
    fn airborne_needs_a_ground_sample_first() {
        let t0 = Instant::now();
        let mut snap = parked();
        snap.on_ground = false;
        let mut fields = TrackedFields::default();
        let outcome = detect(&mut fields, &snap, t0);
        assert!(!fields_of(&outcome).contains(&Field::Airborne));
    }

    #[test]
    fn spoilers_announce_only_when_armed() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.spoilers_armed = true;
        assert_eq!(
            fields_of(&detect(&mut fields, &snap, t0)),
            vec![Field::SpoilersArmed]
        );
        snap.spoilers_armed = false;
        assert!(fields_of(&detect(&mut fields, &snap, t0)).is_empty());
        snap.spoilers_armed = true;
        assert_eq!(
            fields_of(&detect(&mut fields, &snap, t0)),
            vec![Field::SpoilersArmed]
        );
    }

    #[test]
    fn parking_brake_release_is_announced() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.parking_brake = false;
        let outcome = detect(&mut fields, &snap, t0);
        assert_eq!(outcome.changes[0].new, FieldValue::Flag(false));
        assert_eq!(outcome.changes[0].old, Some(FieldValue::Flag(true)));
    }

    #[test]
    fn waypoint_waits_for_flight_plan_to_settle() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.next_waypoint.name = "MERIT".to_string();
        assert!(detect(&mut fields, &snap, t0).changes.is_empty());
        assert!(fields.waypoint_pending());
        assert!(detect(&mut fields, &snap, t0 + Duration::from_millis(2_500))
            .changes
            .is_empty());

        // distance updates arrive during the delay and are what gets spoken
        snap.next_waypoint.distance_m = 42_000.0;
        let outcome = detect(&mut fields, &snap, t0 + WAYPOINT_DELAY);
        assert_eq!(outcome.changes.len(), 1);
        let FieldValue::Waypoint(wp) = &outcome.changes[0].new else {
            panic!("expected waypoint value");
        };
        assert_eq!(wp.name, "MERIT");
        assert_eq!(wp.distance_m, 42_000.0);
        assert!(!fields.waypoint_pending());
    }

    #[test]
    fn waypoint_delay_restarts_on_another_change() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.next_waypoint.name = "MERIT".to_string();
        detect(&mut fields, &snap, t0);
        snap.next_waypoint.name = "HFD".to_string();
        let t1 = t0 + Duration::from_secs(2);
        detect(&mut fields, &snap, t1);

        assert!(detect(&mut fields, &snap, t0 + WAYPOINT_DELAY).changes.is_empty());
        let outcome = detect(&mut fields, &snap, t1 + WAYPOINT_DELAY);
        assert_eq!(fields_of(&outcome), vec![Field::NextWaypoint]);
    }

    #[test]
    fn empty_waypoint_is_suppressed() {
        let t0 = Instant::now();
        let mut snap = parked();
        let mut fields = primed(&snap, t0);

        snap.next_waypoint.name.clear();
        let outcome = detect(&mut fields, &snap, t0);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].policy, Policy::Suppressed);
        assert!(!fields.waypoint_pending());
    }
}
