//! Hotkey dispatch and periodic task registration.

use crate::flight_following::{flight_following_task, FollowCommand, FollowSettings};
use crate::geonames::GeoService;
use crate::hotkeys::{Action, HotkeyEvent};
use crate::phrases::{readout, Readout};
use crate::sonify::{play, sonify_task, CONFIRM_TONE};
use crate::state::AppState;
use crate::telemetry_task::{instrument_task, simconnect_task};
use flightfollowing_shared::InstrumentSnapshot;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const FOLLOWING_DISABLED: &str = "Flight Following functions disabled.";

// ======================================================================
//  Periodic tasks
// ======================================================================
/// Start the instrument and SimConnect pollers the session has enabled.
/// A disabled feature gets no task at all.
pub fn spawn_periodic_tasks(state: &AppState) -> Vec<JoinHandle<()>> {
    let toggles = state.session().toggles;
    let mut handles = Vec::new();

    if toggles.instrumentation {
        handles.push(tokio::spawn(instrument_task(
            state.clone(),
            state.shutdown.child_token(),
        )));
    }
    if toggles.simconnect {
        handles.push(tokio::spawn(simconnect_task(
            state.clone(),
            state.shutdown.child_token(),
        )));
    }
    tracing::info!(
        instrumentation = toggles.instrumentation,
        simconnect = toggles.simconnect,
        "periodic tasks registered"
    );
    handles
}

pub fn spawn_flight_following<G: GeoService>(
    state: &AppState,
    geo: G,
    settings: FollowSettings,
    commands: mpsc::Receiver<FollowCommand>,
) -> JoinHandle<()> {
    tracing::info!(interval_s = settings.interval.as_secs(), "flight following registered");
    tokio::spawn(flight_following_task(
        geo,
        state.telemetry.clone(),
        state.announcer.clone(),
        settings,
        commands,
        state.shutdown.child_token(),
    ))
}

// ======================================================================
//  Hotkey dispatch
// ======================================================================
pub async fn dispatch_task(state: AppState, mut events: mpsc::Receiver<HotkeyEvent>) {
    loop {
        let event = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        handle_event(&state, event).await;
    }
    stop_sonification(&state);
    tracing::info!("hotkey dispatch stopped");
}

pub async fn handle_event(state: &AppState, event: HotkeyEvent) {
    tracing::debug!(?event, "hotkey");
    let action = match event {
        HotkeyEvent::CommandMode => {
            play(&state.tones, CONFIRM_TONE);
            return;
        }
        HotkeyEvent::Action(action) => action,
    };

    match action {
        Action::Readout(kind) => speak_readout(state, kind).await,
        Action::City => send_follow(state, FollowCommand::LookupNow),
        Action::ToggleFollowing => send_follow(state, FollowCommand::Toggle),
        Action::ToggleAttitude => toggle_attitude(state),
        Action::ReplayMessage => {
            let phrases = state.session().messages.replay();
            for text in phrases {
                state.announcer.hotkey(text);
            }
        }
    }
}

/// Fresh read if the simulator answers, else the last polled snapshot.
async fn current_snapshot(state: &AppState) -> Option<InstrumentSnapshot> {
    match state.telemetry.read_instruments().await {
        Ok(snap) => Some(snap),
        Err(e) => {
            tracing::debug!("readout using last snapshot, read failed: {e}");
            state.session().snapshot.clone()
        }
    }
}

async fn speak_readout(state: &AppState, kind: Readout) {
    let snap = current_snapshot(state).await;
    for text in readout(kind, snap.as_ref(), state.units) {
        state.announcer.hotkey(text);
    }
}

fn send_follow(state: &AppState, cmd: FollowCommand) {
    let Some(tx) = &state.follow_tx else {
        state.announcer.hotkey(FOLLOWING_DISABLED);
        return;
    };
    if let Err(e) = tx.try_send(cmd) {
        tracing::warn!("flight following busy, {cmd:?} dropped: {e}");
    }
}

fn toggle_attitude(state: &AppState) {
    let mut session = state.session();
    if let Some(token) = session.sonify.take() {
        token.cancel();
        drop(session);
        state.announcer.hotkey("attitude mode disabled.");
        return;
    }

    let token = state.shutdown.child_token();
    tokio::spawn(sonify_task(
        state.telemetry.clone(),
        state.tones.clone(),
        token.clone(),
    ));
    session.sonify = Some(token);
    drop(session);
    state.announcer.hotkey("attitude mode enabled");
}

fn stop_sonification(state: &AppState) {
    if let Some(token) = state.session().sonify.take() {
        token.cancel();
    }
}
