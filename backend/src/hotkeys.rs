//! Two-stage hotkeys: the command key, then one action key within the chord
//! window. Keys arrive as characters typed on stdin, a line at a time, so
//! every key on one line shares the time the line arrived. The chord window
//! only separates keys typed on different lines.

use crate::config::HotkeyConfig;
use crate::phrases::Readout;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const CHORD_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Readout(Readout),
    City,
    ToggleAttitude,
    ReplayMessage,
    ToggleFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Command key accepted, waiting for the action key.
    CommandMode,
    Action(Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChordState {
    Idle,
    AwaitingChord { deadline: Instant },
}

pub struct ChordMachine {
    command_key: char,
    bindings: Vec<(char, Action)>,
    state: ChordState,
}

impl ChordMachine {
    pub fn new(keys: &HotkeyConfig) -> Self {
        let bindings = vec![
            (keys.agl, Action::Readout(Readout::AltitudeAgl)),
            (keys.asl, Action::Readout(Readout::AltitudeAsl)),
            (keys.heading, Action::Readout(Readout::Heading)),
            (keys.ias, Action::Readout(Readout::IndicatedAirspeed)),
            (keys.tas, Action::Readout(Readout::TrueAirspeed)),
            (keys.mach, Action::Readout(Readout::Mach)),
            (keys.waypoint, Action::Readout(Readout::Waypoint)),
            (keys.dest, Action::Readout(Readout::Destination)),
            (keys.city, Action::City),
            (keys.attitude, Action::ToggleAttitude),
            (keys.message, Action::ReplayMessage),
            (keys.follow_toggle, Action::ToggleFollowing),
        ];
        Self {
            command_key: keys.command,
            bindings,
            state: ChordState::Idle,
        }
    }

    pub fn is_armed(&self, now: Instant) -> bool {
        matches!(self.state, ChordState::AwaitingChord { deadline } if now <= deadline)
    }

    pub fn on_key(&mut self, key: char, now: Instant) -> Option<HotkeyEvent> {
        if !self.is_armed(now) {
            self.state = ChordState::Idle;
        }
        match self.state {
            ChordState::Idle => {
                if key == self.command_key {
                    self.state = ChordState::AwaitingChord {
                        deadline: now + CHORD_TIMEOUT,
                    };
                    return Some(HotkeyEvent::CommandMode);
                }
                None
            }
            ChordState::AwaitingChord { .. } => {
                self.state = ChordState::Idle;
                let action = self
                    .bindings
                    .iter()
                    .find(|(bound, _)| *bound == key)
                    .map(|(_, action)| *action);
                if action.is_none() {
                    tracing::debug!(%key, "no action bound to key");
                }
                action.map(HotkeyEvent::Action)
            }
        }
    }
}

/// Read keys from `input` until it closes or shutdown is requested.
pub async fn hotkey_task<R>(
    input: R,
    mut machine: ChordMachine,
    events: mpsc::Sender<HotkeyEvent>,
    shutdown: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("keyboard input closed, hotkeys disabled");
                break;
            }
            Err(e) => {
                tracing::warn!("failed to read keyboard input: {e}");
                break;
            }
        };
        let now = tokio::time::Instant::now().into_std();
        for key in line.chars().filter(|c| !c.is_whitespace()) {
            if let Some(event) = machine.on_key(key, now)
                && events.send(event).await.is_err()
            {
                return;
            }
        }
    }
}
