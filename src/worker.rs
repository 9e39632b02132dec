//! Single worker feeding the pipeline
//!
//! Transports push raw payloads into a bounded queue; exactly one worker
//! pops them and runs each through the pipeline to completion before taking
//! the next. This is what keeps two utterances from ever overlapping.

use crate::audio::PlaybackSink;
use crate::pipeline::{Disposition, Pipeline};
use crate::speech::SynthesisEngine;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

/// How often an idle worker checks for shutdown
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Sending half handed to transports
pub type MessageSender = SyncSender<Vec<u8>>;

/// Bounded queue between transports and the worker
///
/// Senders block while the queue is full.
pub fn queue(depth: usize) -> (MessageSender, Receiver<Vec<u8>>) {
    mpsc::sync_channel(depth)
}

/// Counts of message outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub played: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl WorkerStats {
    fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Played(_) => self.played += 1,
            Disposition::Skipped(_) => self.skipped += 1,
            Disposition::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.played + self.skipped + self.failed
    }
}

/// Serve messages until `stop` is set or every sender is gone
///
/// A message already taken off the queue always runs to completion.
pub fn run<E, S>(
    pipeline: &mut Pipeline<E, S>,
    rx: Receiver<Vec<u8>>,
    stop: &AtomicBool,
) -> WorkerStats
where
    E: SynthesisEngine,
    S: PlaybackSink,
{
    let mut stats = WorkerStats::default();

    while !stop.load(Ordering::Relaxed) {
        match rx.recv_timeout(IDLE_POLL) {
            Ok(payload) => {
                debug!("Dequeued message ({} bytes)", payload.len());
                let disposition = pipeline.handle_bytes(&payload);
                stats.record(&disposition);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("All message sources closed");
                break;
            }
        }
    }

    stats
}
