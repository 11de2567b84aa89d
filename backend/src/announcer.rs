//! Single ordered stream of utterances.
//!
//! Producers push from any task or thread. One speaker thread pops and
//! speaks one request at a time. Hotkey requests jump ahead of periodic
//! ones that are still waiting, but never cut off what is being spoken.
//! The queue is unbounded: producers are human-paced and nothing is dropped.

use crate::speech::SpeechSink;
use flightfollowing_shared::{AnnouncementRequest, Priority, Source};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

#[derive(Default)]
struct Lanes {
    hotkey: VecDeque<AnnouncementRequest>,
    periodic: VecDeque<AnnouncementRequest>,
    closed: bool,
}

impl Lanes {
    fn pop(&mut self) -> Option<AnnouncementRequest> {
        self.hotkey.pop_front().or_else(|| self.periodic.pop_front())
    }

    fn len(&self) -> usize {
        self.hotkey.len() + self.periodic.len()
    }
}

#[derive(Default)]
struct Queue {
    lanes: Mutex<Lanes>,
    ready: Condvar,
}

/// Cloneable producer handle onto the speech queue.
#[derive(Clone, Default)]
pub struct Announcer {
    queue: Arc<Queue>,
}

impl Announcer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lanes(&self) -> MutexGuard<'_, Lanes> {
        self.queue.lanes.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn announce(&self, request: AnnouncementRequest) {
        let mut lanes = self.lanes();
        if lanes.closed {
            tracing::debug!(text = %request.text, "speech queue closed, dropping");
            return;
        }
        tracing::trace!(source = ?request.source, priority = ?request.priority, text = %request.text, "queued");
        match request.priority {
            Priority::Hotkey => lanes.hotkey.push_back(request),
            Priority::Periodic => lanes.periodic.push_back(request),
        }
        self.queue.ready.notify_one();
    }

    pub fn periodic(&self, source: Source, text: impl Into<String>) {
        self.announce(AnnouncementRequest::periodic(source, text));
    }

    pub fn hotkey(&self, text: impl Into<String>) {
        self.announce(AnnouncementRequest::hotkey(text));
    }

    /// Requests waiting to be spoken, not counting one in progress.
    pub fn pending(&self) -> usize {
        self.lanes().len()
    }

    /// Take everything queued, in speaking order.
    #[cfg(test)]
    pub fn drain(&self) -> Vec<String> {
        let mut lanes = self.lanes();
        std::iter::from_fn(|| lanes.pop()).map(|r| r.text).collect()
    }

    /// Stop accepting requests. The speaker finishes what is queued, then exits.
    pub fn close(&self) {
        self.lanes().closed = true;
        self.queue.ready.notify_all();
    }

    /// Block until a request is available. `None` once closed and drained.
    fn next(&self) -> Option<AnnouncementRequest> {
        let mut lanes = self.lanes();
        loop {
            if let Some(request) = lanes.pop() {
                return Some(request);
            }
            if lanes.closed {
                return None;
            }
            lanes = self
                .queue
                .ready
                .wait(lanes)
                .unwrap_or_else(|p| p.into_inner());
        }
    }
}

/// Start the thread that drains `announcer` into `sink`.
pub fn spawn_speaker(
    announcer: &Announcer,
    mut sink: Box<dyn SpeechSink>,
) -> std::io::Result<JoinHandle<()>> {
    let announcer = announcer.clone();
    std::thread::Builder::new()
        .name("speaker".to_string())
        .spawn(move || {
            tracing::info!(sink = sink.name(), "speaker started");
            while let Some(request) = announcer.next() {
                tracing::debug!(source = ?request.source, text = %request.text, "speaking");
                if let Err(e) = sink.speak(&request.text) {
                    tracing::warn!("speech failed: {e}");
                }
            }
            tracing::info!("speaker stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::fake::{GatedSink, RecordingSink};

    #[test]
    fn hotkey_request_overtakes_waiting_periodic() {
        let announcer = Announcer::new();
        announcer.periodic(Source::Instruments, "Flaps 10");
        announcer.hotkey("5000 feet A S L");

        let sink = RecordingSink::default();
        announcer.close();
        spawn_speaker(&announcer, Box::new(sink.clone()))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(sink.lines(), vec!["5000 feet A S L", "Flaps 10"]);
    }

    #[test]
    fn utterance_in_progress_is_never_interrupted() {
        let announcer = Announcer::new();
        let sink = GatedSink::default();
        let speaker = spawn_speaker(&announcer, Box::new(sink.clone())).unwrap();

        announcer.periodic(Source::Instruments, "Squawk 1200");
        assert_eq!(sink.wait_started(1), vec!["Squawk 1200"]);

        announcer.periodic(Source::Instruments, "Flaps 5");
        announcer.hotkey("Heading: 90");
        // both wait behind the utterance already being spoken
        assert_eq!(announcer.pending(), 2);

        sink.release(1);
        assert_eq!(sink.wait_started(2)[1], "Heading: 90");
        sink.release(2);
        announcer.close();
        speaker.join().unwrap();

        assert_eq!(sink.lines(), vec!["Squawk 1200", "Heading: 90", "Flaps 5"]);
    }

    #[test]
    fn fifo_within_a_lane() {
        let announcer = Announcer::new();
        for text in ["one", "two", "three"] {
            announcer.periodic(Source::SimConnect, text);
        }
        announcer.hotkey("a");
        announcer.hotkey("b");
        announcer.close();

        let sink = RecordingSink::default();
        spawn_speaker(&announcer, Box::new(sink.clone()))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(sink.lines(), vec!["a", "b", "one", "two", "three"]);
    }

    #[test]
    fn closed_queue_rejects_new_requests() {
        let announcer = Announcer::new();
        announcer.close();
        announcer.hotkey("too late");
        assert_eq!(announcer.pending(), 0);
    }
}
