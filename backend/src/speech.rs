use crate::error::SpeechError;
use std::io::Write;
use std::process::{Command, Stdio};

/// Where finished utterances go. `speak` blocks until the text has been
/// handed off completely; the announcer relies on that for ordering.
pub trait SpeechSink: Send {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;

    /// Voice rate in the -10..=10 range. Sinks without a voice ignore it.
    fn set_rate(&mut self, _rate: i8) {}

    fn name(&self) -> &str;
}

// ======================================================================
//  Screen reader / console
// ======================================================================
/// One line per utterance on stdout, for a screen reader to pick up.
pub struct ConsoleSink<W: Write + Send = std::io::Stdout> {
    out: W,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SpeechSink for ConsoleSink<W> {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        writeln!(self.out, "{text}")?;
        self.out.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

// ======================================================================
//  External TTS program
// ======================================================================
/// Runs a text-to-speech program once per utterance and waits for it.
///
/// Invoked as `<program> -s <words per minute> <text>`, which espeak-ng and
/// compatible programs understand.
pub struct CommandSink {
    program: String,
    words_per_minute: u32,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, rate: i8) -> Self {
        let mut sink = Self {
            program: program.into(),
            words_per_minute: 0,
        };
        sink.set_rate(rate);
        sink
    }

    pub fn words_per_minute(&self) -> u32 {
        self.words_per_minute
    }
}

/// Rate 0 is a normal speaking voice; each step is 20 wpm, floored at 80.
fn rate_to_wpm(rate: i8) -> u32 {
    (175 + rate.clamp(-10, 10) as i32 * 20).max(80) as u32
}

impl SpeechSink for CommandSink {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        let status = Command::new(&self.program)
            .arg("-s")
            .arg(self.words_per_minute.to_string())
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(SpeechError::Exit {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: i8) {
        self.words_per_minute = rate_to_wpm(rate);
    }

    fn name(&self) -> &str {
        &self.program
    }
}

// ======================================================================
//  Test sinks
// ======================================================================
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::{Arc, Condvar, Mutex};

    /// Records every utterance.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub spoken: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSink {
        pub fn lines(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    impl SpeechSink for RecordingSink {
        fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    /// Holds each utterance "in progress" until the test releases it.
    #[derive(Clone, Default)]
    pub struct GatedSink {
        pub spoken: Arc<Mutex<Vec<String>>>,
        gate: Arc<(Mutex<GateState>, Condvar)>,
    }

    #[derive(Default)]
    struct GateState {
        started: Vec<String>,
        releases: usize,
    }

    impl GatedSink {
        /// Block until `count` utterances have started.
        pub fn wait_started(&self, count: usize) -> Vec<String> {
            let (lock, cvar) = &*self.gate;
            let guard = cvar
                .wait_while(lock.lock().unwrap(), |s| s.started.len() < count)
                .unwrap();
            guard.started.clone()
        }

        pub fn release(&self, n: usize) {
            let (lock, cvar) = &*self.gate;
            lock.lock().unwrap().releases += n;
            cvar.notify_all();
        }

        pub fn lines(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    impl SpeechSink for GatedSink {
        fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
            let (lock, cvar) = &*self.gate;
            let mut state = lock.lock().unwrap();
            state.started.push(text.to_string());
            cvar.notify_all();
            let mut state = cvar.wait_while(state, |s| s.releases == 0).unwrap();
            state.releases -= 1;
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }
}
