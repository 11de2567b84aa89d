//! Flight following: on a slow timer, look up where the aircraft is and
//! say the nearest city, the ocean below, and the time zone when it changes.
//!
//! The three lookups run one after another and fail independently. A tick
//! in progress is dropped, not finished, when following is switched off or
//! the process shuts down.

use crate::announcer::Announcer;
use crate::error::{ServiceError, ServiceErrorKind};
use crate::geonames::{GeoService, Place};
use crate::phrases::DistanceUnits;
use crate::telemetry_source::Telemetry;
use flightfollowing_shared::{Angle, Position, Source};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowCommand {
    /// City hotkey: run a tick now.
    LookupNow,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    NearestCity,
    Ocean,
    Timezone,
}

impl Lookup {
    fn spoken(self) -> &'static str {
        match self {
            Lookup::NearestCity => "nearest city",
            Lookup::Ocean => "ocean",
            Lookup::Timezone => "time zone",
        }
    }
}

fn failure_phrase(lookup: Lookup, kind: ServiceErrorKind) -> String {
    let reason = match kind {
        ServiceErrorKind::Connection => "Geonames connection error",
        ServiceErrorKind::Http | ServiceErrorKind::Other => "Geonames may be busy",
    };
    format!("cannot find {}. {reason}. Check error log.", lookup.spoken())
}

/// Initial great-circle bearing from `from` to `to`.
pub fn initial_bearing(from: Position, to: Position) -> Angle {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let dlon = (to.longitude - from.longitude).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    Angle::from_degrees(y.atan2(x).to_degrees())
}

/// "America/Argentina/Buenos_Aires" -> "Buenos Aires time".
pub fn friendly_zone_name(zone_id: &str) -> String {
    let city = zone_id.rsplit('/').next().unwrap_or(zone_id).replace('_', " ");
    format!("{city} time")
}

fn city_phrase(place: &Place, from: Position, units: DistanceUnits) -> String {
    format!(
        "Closest city: {} {}. {:.1} {}. Bearing: {}",
        place.name,
        place.admin_name,
        units.from_km(place.distance_km),
        units.spoken(),
        initial_bearing(from, place.position).whole_degrees()
    )
}

/// State carried between ticks.
#[derive(Debug, Default)]
pub struct FollowState {
    last_zone: Option<String>,
}

struct Tick<'a> {
    at: Position,
    units: DistanceUnits,
    announcer: &'a Announcer,
}

impl Tick<'_> {
    fn say(&self, text: String) {
        self.announcer.periodic(Source::FlightFollowing, text);
    }

    fn fail(&self, lookup: Lookup, e: &ServiceError) {
        tracing::error!(
            lat = self.at.latitude,
            lon = self.at.longitude,
            lookup = lookup.spoken(),
            "geo lookup failed: {e}"
        );
        self.say(failure_phrase(lookup, e.kind()));
    }
}

/// One flight-following cycle at `at`.
pub async fn follow_tick<G: GeoService>(
    geo: &G,
    state: &mut FollowState,
    at: Position,
    units: DistanceUnits,
    announcer: &Announcer,
) {
    let tick = Tick {
        at,
        units,
        announcer,
    };

    let city_distance_km = match geo.nearest_place(at).await {
        Ok(Some(place)) => {
            tick.say(city_phrase(&place, at, tick.units));
            place.distance_km
        }
        Ok(None) => 0.0,
        Err(e) => {
            tick.fail(Lookup::NearestCity, &e);
            0.0
        }
    };

    match geo.ocean(at).await {
        // a city right underneath means the ocean answer is a coastline quirk
        Ok(Some(ocean)) if city_distance_km > 0.0 => tick.say(format!("currently over {ocean}")),
        Ok(_) => {}
        Err(e) => tick.fail(Lookup::Ocean, &e),
    }

    match geo.timezone(at).await {
        Ok(Some(zone)) => {
            if state.last_zone.as_deref() != Some(zone.as_str()) {
                tick.say(format!("{}.", friendly_zone_name(&zone)));
                state.last_zone = Some(zone);
            }
        }
        Ok(None) => {}
        Err(e) => tick.fail(Lookup::Timezone, &e),
    }
}

pub struct FollowSettings {
    pub interval: Duration,
    pub units: DistanceUnits,
}

/// Position for the next tick, or `None` (already logged) if unreadable.
async fn current_position(telemetry: &Telemetry) -> Option<Position> {
    match telemetry.read_instruments().await {
        Ok(snap) => Some(snap.position),
        Err(e) => {
            tracing::warn!("flight following skipped, telemetry read failed: {e}");
            None
        }
    }
}

/// Flight-following timer. Owns the time zone debounce state; the city
/// hotkey and the on/off toggle arrive through `commands`.
pub async fn flight_following_task<G: GeoService>(
    geo: G,
    telemetry: Telemetry,
    announcer: Announcer,
    settings: FollowSettings,
    mut commands: mpsc::Receiver<FollowCommand>,
    shutdown: CancellationToken,
) {
    let mut state = FollowState::default();
    let mut enabled = true;
    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let run = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick(), if enabled => true,
            cmd = commands.recv() => match cmd {
                Some(FollowCommand::LookupNow) => true,
                Some(FollowCommand::Toggle) => {
                    enabled = !enabled;
                    announce_toggle(&announcer, enabled);
                    if enabled {
                        ticker.reset_immediately();
                    }
                    false
                }
                None => break,
            },
        };
        if !run {
            continue;
        }
        let Some(at) = current_position(&telemetry).await else {
            continue;
        };

        let tick = follow_tick(&geo, &mut state, at, settings.units, &announcer);
        tokio::pin!(tick);
        loop {
            tokio::select! {
                _ = &mut tick => break,
                _ = shutdown.cancelled() => return,
                cmd = commands.recv() => match cmd {
                    Some(FollowCommand::Toggle) => {
                        tracing::info!("flight following disabled, dropping lookup in progress");
                        enabled = false;
                        announce_toggle(&announcer, enabled);
                        break;
                    }
                    Some(FollowCommand::LookupNow) => {
                        tracing::debug!("lookup already running");
                    }
                    None => return,
                },
            }
        }
    }
    tracing::info!("flight following stopped");
}

fn announce_toggle(announcer: &Announcer, enabled: bool) {
    announcer.hotkey(if enabled {
        "Flight following enabled."
    } else {
        "Flight following disabled."
    });
}
