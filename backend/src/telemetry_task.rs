use crate::change_detect::detect;
use crate::phrases::change_phrases;
use crate::state::AppState;
use flightfollowing_shared::Source;
use tokio::time::{interval, sleep, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One instrument read + detection pass. Returns the re-poll delay the
/// settle logic asked for, if any.
async fn poll_instruments(state: &AppState) -> Option<Duration> {
    let snapshot = match state.telemetry.read_instruments().await {
        Ok(s) => s,
        Err(e) => {
            // keep the last snapshot, try again next cycle
            tracing::debug!("instrument read failed: {e}");
            return None;
        }
    };

    let outcome = {
        let mut session = state.session();
        let outcome = detect(&mut session.fields, &snapshot, Instant::now().into_std());
        session.snapshot = Some(snapshot);
        outcome
    };

    for change in &outcome.changes {
        tracing::debug!(field = ?change.field, old = ?change.old, new = ?change.new, policy = ?change.policy, "field change");
    }
    for change in outcome.announced() {
        for text in change_phrases(change, state.units) {
            state.announcer.periodic(Source::Instruments, text);
        }
    }
    outcome.repoll_after
}

pub async fn instrument_task(state: AppState, shutdown: CancellationToken) {
    let mut poll_interval = interval(POLL_INTERVAL);
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let repoll = sleep(Duration::ZERO);
    tokio::pin!(repoll);
    let mut repoll_armed = false;

    loop {
        let due = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = poll_interval.tick() => poll_instruments(&state).await,
            _ = &mut repoll, if repoll_armed => {
                repoll_armed = false;
                poll_instruments(&state).await
            }
        };
        if let Some(after) = due {
            repoll.as_mut().reset(Instant::now() + after);
            repoll_armed = true;
        }
    }
    tracing::info!("instrument polling stopped");
}

async fn poll_messages(state: &AppState) {
    let msg = match state.telemetry.read_simconnect().await {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("sim connect read failed: {e}");
            return;
        }
    };
    let phrases = state.session().messages.observe(msg);
    for text in phrases.into_iter().flatten() {
        state.announcer.periodic(Source::SimConnect, text);
    }
}

pub async fn simconnect_task(state: AppState, shutdown: CancellationToken) {
    let mut poll_interval = interval(POLL_INTERVAL);
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = poll_interval.tick() => poll_messages(&state).await,
        }
    }
    tracing::info!("sim connect polling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcer::spawn_speaker;
    use crate::schema::RawValue;
    use crate::speech::fake::RecordingSink;
    use crate::state::fixture::app_state;
    use crate::telemetry_source::fake::ScriptedSource;

    const TRANSPONDER: usize = 21;
    const FLAPS: usize = 5;

    /// Run the instrument task for `span` of paused time.
    async fn run_for(state: &AppState, span: Duration) {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(instrument_task(state.clone(), shutdown.clone()));
        tokio::time::sleep(span).await;
        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn squawk_change_is_spoken_exactly_once() {
        let source = ScriptedSource::parked();
        source.patch(TRANSPONDER, RawValue::UInt(0x7000));
        let state = app_state(source.clone());

        run_for(&state, Duration::from_secs(4)).await;
        state.announcer.drain();

        source.patch(TRANSPONDER, RawValue::UInt(0x1200));
        run_for(&state, Duration::from_secs(2)).await;

        let sink = RecordingSink::default();
        state.announcer.close();
        spawn_speaker(&state.announcer, Box::new(sink.clone()))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(sink.lines(), vec!["Squawk 1200"]);
    }

    #[tokio::test(start_paused = true)]
    async fn moving_flaps_trigger_fast_repolls() {
        let source = ScriptedSource::parked();
        let state = app_state(source.clone());
        run_for(&state, Duration::from_secs(4)).await;
        state.announcer.drain();

        source.patch(FLAPS, RawValue::Int(15 * 256));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(instrument_task(state.clone(), shutdown.clone()));
        // first tick sees the new value, the 200 ms re-poll confirms it,
        // well before the next 500 ms tick
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(state.announcer.drain(), vec!["Flaps 15"]);
        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn read_failures_keep_the_last_snapshot() {
        let source = ScriptedSource::parked();
        let state = app_state(source.clone());
        run_for(&state, Duration::from_secs(1)).await;
        let before = state.session().snapshot.clone();
        assert!(before.is_some());

        *source.fail_reads.lock().unwrap() = true;
        source.patch(TRANSPONDER, RawValue::UInt(0x7700));
        run_for(&state, Duration::from_secs(2)).await;
        assert_eq!(state.session().snapshot, before);
    }

    #[tokio::test(start_paused = true)]
    async fn new_simconnect_message_is_read_out() {
        let source = ScriptedSource::parked();
        let mut text = b"Tower\0Cleared to land runway 27\0".to_vec();
        let len = text.len() as u64;
        text.resize(2028, 0);
        source.set(
            "simconnect",
            vec![
                RawValue::UInt(7),
                RawValue::UInt(1),
                RawValue::UInt(10),
                RawValue::UInt(0),
                RawValue::UInt(len),
                RawValue::Bytes(text),
            ],
        );
        let state = app_state(source);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(simconnect_task(state.clone(), shutdown.clone()));
        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(
            state.announcer.drain(),
            vec!["Tower", "Cleared to land runway 27"]
        );
    }
}
