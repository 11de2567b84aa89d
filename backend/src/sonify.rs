//! Attitude sonification: a short tone every 200 ms whose pitch follows the
//! aircraft's nose. Lower sine tones for nose down, higher triangle tones
//! for nose up, silence when level or beyond ten degrees.

use crate::telemetry_source::Telemetry;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const SONIFY_INTERVAL: Duration = Duration::from_millis(200);
const TONE_LENGTH: Duration = Duration::from_millis(70);
const STEPS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f64,
    pub duration: Duration,
    pub waveform: Waveform,
}

/// Played when the command key is accepted.
pub const CONFIRM_TONE: Tone = Tone {
    frequency_hz: 500.0,
    duration: Duration::from_millis(100),
    waveform: Waveform::Sine,
};

/// Audio output for tones. Synthesis lives behind this trait.
pub trait ToneSink: Send {
    fn play(&mut self, tone: Tone);
}

/// Default sink: records tones in the trace log only.
pub struct LogToneSink;

impl ToneSink for LogToneSink {
    fn play(&mut self, tone: Tone) {
        tracing::trace!(hz = tone.frequency_hz, ms = tone.duration.as_millis() as u64, waveform = ?tone.waveform, "tone");
    }
}

pub type SharedToneSink = Arc<Mutex<Box<dyn ToneSink>>>;

pub fn play(sink: &SharedToneSink, tone: Tone) {
    sink.lock().unwrap_or_else(|p| p.into_inner()).play(tone);
}

/// `from` to `to` in `STEPS` evenly spaced values, both ends included.
fn step_frequency(from: f64, to: f64, index: usize) -> f64 {
    from + (to - from) * index as f64 / (STEPS - 1) as f64
}

/// Tone for a signed pitch in degrees, positive nose down.
pub fn tone_for_pitch(pitch_deg: f64) -> Option<Tone> {
    let tenths = (pitch_deg * 10.0).round() as i64;
    let (index, from, to, waveform) = match tenths {
        1..=99 => (tenths - 1, 600.0, 200.0, Waveform::Sine),
        -99..=-1 => (-tenths - 1, 800.0, 1200.0, Waveform::Triangle),
        _ => return None,
    };
    Some(Tone {
        frequency_hz: step_frequency(from, to, index as usize),
        duration: TONE_LENGTH,
        waveform,
    })
}

/// Runs until `cancel` fires; the attitude toggle owns the token.
pub async fn sonify_task(telemetry: Telemetry, sink: SharedToneSink, cancel: CancellationToken) {
    let mut ticker = interval(SONIFY_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::debug!("attitude sonification started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match telemetry.read_attitude().await {
                    Ok(attitude) => {
                        if let Some(tone) = tone_for_pitch(attitude.pitch.signed()) {
                            play(&sink, tone);
                        }
                    }
                    Err(e) => tracing::trace!("attitude read failed: {e}"),
                }
            }
        }
    }
    tracing::debug!("attitude sonification stopped");
}


#[cfg(test)]
mod tests {
    use super::fake::RecordingToneSink;
    use super::*;
    use crate::telemetry_decode::tests::attitude_block;
    use crate::telemetry_source::fake::ScriptedSource;

    #[test]
    fn nose_down_tables_fall_from_600_to_200() {
        let first = tone_for_pitch(0.1).unwrap();
        assert_eq!(first.frequency_hz, 600.0);
        assert_eq!(first.waveform, Waveform::Sine);
        assert!((tone_for_pitch(9.9).unwrap().frequency_hz - 200.0 - 400.0 / 99.0).abs() < 1e-9);
        assert_eq!(first.duration, Duration::from_millis(70));
    }

    #[test]
    fn nose_up_tables_rise_from_800() {
        let tone = tone_for_pitch(-0.1).unwrap();
        assert_eq!(tone.frequency_hz, 800.0);
        assert_eq!(tone.waveform, Waveform::Triangle);
        assert!(tone_for_pitch(-6.0).unwrap().frequency_hz > 1000.0);
    }

    #[test]
    fn level_and_steep_attitudes_are_silent() {
        assert_eq!(tone_for_pitch(0.0), None);
        assert_eq!(tone_for_pitch(0.04), None);
        assert_eq!(tone_for_pitch(10.0), None);
        assert_eq!(tone_for_pitch(-12.5), None);
    }

    #[tokio::test(start_paused = true)]
    async fn plays_until_cancelled() {
        let source = ScriptedSource::parked();
        // 2 degrees nose up
        let raw = (-2.0 / 360.0 * 65536.0 * 65536.0) as i64;
        source.set("attitude", attitude_block(raw));
        let telemetry = Telemetry::new(Box::new(source));

        let recorder = RecordingToneSink::default();
        let sink: SharedToneSink = Arc::new(Mutex::new(Box::new(recorder.clone())));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sonify_task(telemetry, sink, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(450)).await;
        cancel.cancel();
        task.await.unwrap();

        let played = recorder.played.lock().unwrap().clone();
        assert_eq!(played.len(), 3);
        assert!(played.iter().all(|t| t.waveform == Waveform::Triangle));
    }
}
