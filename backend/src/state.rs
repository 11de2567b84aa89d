use crate::announcer::Announcer;
use crate::change_detect::TrackedFields;
use crate::flight_following::FollowCommand;
use crate::phrases::DistanceUnits;
use crate::simconnect::MessageTracker;
use crate::sonify::SharedToneSink;
use crate::telemetry_source::Telemetry;
use flightfollowing_shared::InstrumentSnapshot;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Mutable session data. Only the polling tasks and the hotkey dispatcher
/// touch it, always through [`AppState::session`].
#[derive(Debug, Default)]
pub struct SessionState {
    /// Last seen value of every announced instrument field.
    pub fields: TrackedFields,
    pub messages: MessageTracker,
    /// Most recent successfully decoded snapshot.
    pub snapshot: Option<InstrumentSnapshot>,
    pub toggles: Toggles,
    /// Running sonification timer, if any.
    pub sonify: Option<CancellationToken>,
}

/// Features switched on for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toggles {
    pub instrumentation: bool,
    pub simconnect: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<SessionState>>,

    /// Speech queue, shared by every producer.
    pub announcer: Announcer,

    pub telemetry: Telemetry,

    pub tones: SharedToneSink,

    pub units: DistanceUnits,

    /// City hotkey and on/off toggle → flight-following task.
    /// `None` when flight following is disabled in the config.
    pub follow_tx: Option<mpsc::Sender<FollowCommand>>,

    /// Root token; cancelling it stops every task.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }
}
