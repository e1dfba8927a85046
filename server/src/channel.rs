//! Line-oriented text channel between the game core and one player
//!
//! The core only sees a pair of in-memory queues. Whatever transport sits
//! behind them (TCP in `network`, plain queues in tests) pumps raw lines in
//! and rendered text out.

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

/// Lines buffered from a player before the reader waits.
pub const INBOUND_CAPACITY: usize = 32;

/// Result of waiting for one line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Line(String),
    Timeout,
    Closed,
}

/// Core-side end of a player's connection.
#[derive(Debug)]
pub struct PlayerChannel {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::Receiver<String>,
}

/// Transport-side end: push lines in, pull rendered text out.
#[derive(Debug)]
pub struct RemoteEnd {
    pub lines: mpsc::Sender<String>,
    pub output: mpsc::UnboundedReceiver<String>,
}

impl PlayerChannel {
    pub fn new(outbound: mpsc::UnboundedSender<String>, inbound: mpsc::Receiver<String>) -> Self {
        Self { outbound, inbound }
    }

    /// Creates a connected channel pair.
    pub fn pair(capacity: usize) -> (PlayerChannel, RemoteEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
        (
            PlayerChannel::new(out_tx, in_rx),
            RemoteEnd {
                lines: in_tx,
                output: out_rx,
            },
        )
    }

    /// Best-effort write; a vanished peer is noticed on the next read.
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.outbound.send(text.into());
    }

    /// Waits for the next line, giving up at `deadline` if one is set.
    ///
    /// Cancel-safe: dropping the future never loses a line.
    pub async fn receive_line(&mut self, deadline: Option<Instant>) -> Incoming {
        let received = match deadline {
            Some(deadline) => match timeout_at(deadline, self.inbound.recv()).await {
                Ok(received) => received,
                Err(_) => return Incoming::Timeout,
            },
            None => self.inbound.recv().await,
        };
        match received {
            Some(line) => Incoming::Line(line.trim_end_matches(&['\r', '\n'][..]).to_string()),
            None => Incoming::Closed,
        }
    }
}

impl RemoteEnd {
    pub async fn send_line(&self, line: &str) -> bool {
        self.lines.send(line.to_string()).await.is_ok()
    }

    /// Collects output until a chunk containing `needle` arrives.
    ///
    /// Returns everything read so far, or `None` if the core side closed first.
    pub async fn read_until(&mut self, needle: &str) -> Option<String> {
        let mut seen = String::new();
        while let Some(chunk) = self.output.recv().await {
            seen.push_str(&chunk);
            if seen.contains(needle) {
                return Some(seen);
            }
        }
        None
    }
}
