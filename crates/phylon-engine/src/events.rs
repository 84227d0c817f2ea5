//! Channel-backed lineage event sink.
//!
//! Lets a consumer on another thread (a narrative writer, a save-game
//! journal) receive extinction events as turns commit.

use crossbeam_channel::{Receiver, Sender};
use tracing::warn;

use phylon_core::{LineageEvent, LineageEventLog};

/// Forwards every recorded event into a crossbeam channel.
///
/// With a bounded channel, `record` blocks while the channel is full. If
/// the receiver has been dropped, events are discarded with a warning.
#[derive(Clone, Debug)]
pub struct ChannelEventLog {
    tx: Sender<LineageEvent>,
    dropped: u64,
}

impl ChannelEventLog {
    /// Sink over an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<LineageEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx, dropped: 0 }, rx)
    }

    /// Sink over a channel holding at most `capacity` pending events.
    pub fn bounded(capacity: usize) -> (Self, Receiver<LineageEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Events discarded because nobody was listening.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl LineageEventLog for ChannelEventLog {
    fn record(&mut self, event: LineageEvent) {
        if let Err(e) = self.tx.send(event) {
            self.dropped += 1;
            warn!(species = %e.0.lineage_code, "lineage event receiver gone; event dropped");
        }
    }
}
