// main.rs

mod announcer;
mod change_detect;
mod config;
mod error;
mod flight_following;
#[cfg(feature = "testing")]
mod flight_sim;
mod geonames;
mod hotkeys;
mod logging;
mod phrases;
mod scheduler;
mod schema;
mod simconnect;
mod sonify;
mod speech;
mod state;
mod telemetry_decode;
mod telemetry_source;
mod telemetry_task;

use crate::announcer::{spawn_speaker, Announcer};
use crate::config::{Config, SpeechOutput};
use crate::flight_following::FollowSettings;
use crate::geonames::GeonamesClient;
use crate::hotkeys::{hotkey_task, ChordMachine};
use crate::scheduler::{dispatch_task, spawn_flight_following, spawn_periodic_tasks};
use crate::sonify::{LogToneSink, SharedToneSink};
use crate::speech::{CommandSink, ConsoleSink, SpeechSink};
use crate::state::{AppState, SessionState, Toggles};
use crate::telemetry_source::{BridgeSource, Telemetry, TelemetrySource};
use anyhow::Context;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Time to hear a fatal startup message before the process exits.
const EXIT_GRACE: Duration = Duration::from_secs(8);

fn speech_sink(config: &Config) -> Box<dyn SpeechSink> {
    match config.speech_output {
        SpeechOutput::ScreenReader => Box::new(ConsoleSink::stdout()),
        SpeechOutput::Tts => {
            let sink = CommandSink::new(&config.tts_command, config.voice_rate);
            tracing::info!(program = %config.tts_command, wpm = sink.words_per_minute(), "text to speech output");
            Box::new(sink)
        }
    }
}

/// Speak `text`, wait for it to finish, then exit with a failure status.
async fn fatal(text: String) -> anyhow::Result<()> {
    let announcer = Announcer::new();
    let speaker = spawn_speaker(&announcer, Box::new(ConsoleSink::stdout()))
        .context("failed to start speaker thread")?;
    announcer.hotkey(text);
    announcer.close();
    if speaker.join().is_err() {
        tracing::error!("speaker thread panicked");
    }
    tokio::time::sleep(EXIT_GRACE).await;
    std::process::exit(1);
}

/// Wait for the simulator bridge; with `testing`, fall back to a simulated
/// aircraft instead of waiting.
#[cfg_attr(feature = "testing", allow(unused_variables))]
async fn connect(config: &Config, shutdown: &CancellationToken) -> Option<Box<dyn TelemetrySource>> {
    let bridge: Box<dyn TelemetrySource> = Box::new(BridgeSource::new(&config.bridge_address));

    #[cfg(feature = "testing")]
    {
        let mut bridge = bridge;
        match bridge.open() {
            Ok(()) => Some(bridge),
            Err(e) => {
                tracing::warn!("bridge unavailable ({e}), using simulated aircraft");
                let mut sim: Box<dyn TelemetrySource> = Box::new(flight_sim::SimulatedSource::new());
                sim.open().ok()?;
                Some(sim)
            }
        }
    }
    #[cfg(not(feature = "testing"))]
    {
        telemetry_source::open_with_retry(bridge, telemetry_source::CONNECT_RETRY, shutdown).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config::config_path(std::env::args().nth(1));
    let log_guard = logging::init_logging(&logging::log_dir(&path));

    // --- Config ---
    let config = match config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %path.display(), "config: {e}");
            drop(log_guard);
            return fatal(e.spoken()).await;
        }
    };

    // --- Speech ---
    let announcer = Announcer::new();
    let speaker = spawn_speaker(&announcer, speech_sink(&config))
        .context("failed to start speaker thread")?;
    for notice in config.disabled_notices() {
        announcer.hotkey(notice);
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {e}");
            }
            shutdown.cancel();
        });
    }

    // --- Telemetry ---
    let Some(source) = connect(&config, &shutdown).await else {
        announcer.close();
        let _ = speaker.join();
        return Ok(());
    };
    let telemetry = Telemetry::new(source);

    // --- Shared state ---
    let (follow_tx, follow_rx) = mpsc::channel(8);
    let tones: SharedToneSink = Arc::new(Mutex::new(Box::new(LogToneSink)));
    let state = AppState {
        session: Arc::new(Mutex::new(SessionState {
            toggles: Toggles {
                instrumentation: config.read_instrumentation,
                simconnect: config.read_simconnect,
            },
            ..Default::default()
        })),
        announcer: announcer.clone(),
        telemetry: telemetry.clone(),
        tones,
        units: config.distance_units,
        follow_tx: config.flight_following.then_some(follow_tx),
        shutdown: shutdown.clone(),
    };

    // --- Background tasks ---
    let mut tasks = spawn_periodic_tasks(&state);
    if config.flight_following {
        let geo = GeonamesClient::new(&config.geonames_url, &config.geonames_username)
            .context("failed to build Geonames client")?;
        let settings = FollowSettings {
            interval: config.interval,
            units: config.distance_units,
        };
        tasks.push(spawn_flight_following(&state, geo, settings, follow_rx));
    }

    let (hotkey_tx, hotkey_rx) = mpsc::channel(16);
    tasks.push(tokio::spawn(hotkey_task(
        tokio::io::BufReader::new(tokio::io::stdin()),
        ChordMachine::new(&config.hotkeys),
        hotkey_tx,
        shutdown.child_token(),
    )));
    tasks.push(tokio::spawn(dispatch_task(state.clone(), hotkey_rx)));

    tracing::info!("flight following running, ctrl-c to quit");
    shutdown.cancelled().await;

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!("task ended abnormally: {e}");
        }
    }
    telemetry.close();
    tracing::info!(pending = announcer.pending(), "finishing queued speech");
    announcer.close();
    if speaker.join().is_err() {
        tracing::error!("speaker thread panicked");
    }
    // exit skips destructors
    drop(log_guard);
    // the stdin reader thread can stay blocked on a read, don't wait for it
    std::process::exit(0);
}
