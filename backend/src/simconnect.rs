use flightfollowing_shared::SimConnectMessage;

pub const NO_MESSAGE: &str = "No Sim Connect messages yet.";

/// Utterances for one message. The first two lines are a title and the
/// sender, read as-is; anything after that is numbered from 1.
pub fn message_phrases(msg: &SimConnectMessage) -> Vec<String> {
    msg.lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i < 2 {
                line.clone()
            } else {
                format!("{}: {line}", i - 1)
            }
        })
        .collect()
}

/// Remembers which message block was last announced.
#[derive(Debug, Default)]
pub struct MessageTracker {
    last_changed: Option<u32>,
    last: Option<SimConnectMessage>,
}

impl MessageTracker {
    /// Phrases for `msg` if its change counter moved since the last poll.
    pub fn observe(&mut self, msg: SimConnectMessage) -> Option<Vec<String>> {
        if self.last_changed == Some(msg.changed) {
            return None;
        }
        self.last_changed = Some(msg.changed);
        tracing::debug!(changed = msg.changed, lines = msg.lines.len(), "new sim connect message");
        if msg.lines.is_empty() {
            return None;
        }
        let phrases = message_phrases(&msg);
        self.last = Some(msg);
        Some(phrases)
    }

    pub fn replay(&self) -> Vec<String> {
        match &self.last {
            Some(msg) => message_phrases(msg),
            None => vec![NO_MESSAGE.to_string()],
        }
    }
}
