//! Live level feed for an active capture session.
//!
//! While recording, a tokio task samples the session at `feed_fps` and
//! publishes a [`LevelSnapshot`] on a `watch` channel.  Subscribers only ever
//! see the latest snapshot, so a slow UI never backs up the audio path.
//! Cancelling the token stops the task at its next tick.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::spectrum::FrequencyAnalyzer;

// ---------------------------------------------------------------------------
// LevelSnapshot
// ---------------------------------------------------------------------------

/// One frame of the level meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSnapshot {
    /// RMS of the most recent block in `[0.0, 1.0]`.
    pub amplitude: f32,
    /// Byte-scaled frequency bins; empty when no session is running.
    pub frequency_bins: Vec<u8>,
    pub recorded_secs: f32,
}

impl LevelSnapshot {
    /// Snapshot published when nothing is recording.
    pub fn idle() -> Self {
        Self {
            amplitude: 0.0,
            frequency_bins: Vec::new(),
            recorded_secs: 0.0,
        }
    }
}

impl Default for LevelSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

// ---------------------------------------------------------------------------
// LevelSource
// ---------------------------------------------------------------------------

/// What the feed reads from a running session.
pub trait LevelSource: Send + Sync + 'static {
    fn amplitude(&self) -> f32;
    /// Most recent mono samples, oldest first.
    fn recent_samples(&self) -> Vec<f32>;
    fn recorded_secs(&self) -> f32;
}

// ---------------------------------------------------------------------------
// LevelFeed
// ---------------------------------------------------------------------------

/// Handle to the publishing task.
pub struct LevelFeed {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LevelFeed {
    /// Start publishing snapshots of `source` on `tx`.
    pub fn spawn<S: LevelSource>(
        handle: &tokio::runtime::Handle,
        source: Arc<S>,
        mut analyzer: FrequencyAnalyzer,
        fps: u32,
        tx: Arc<watch::Sender<LevelSnapshot>>,
        cancel: CancellationToken,
    ) -> Self {
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        let token = cancel.clone();

        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = LevelSnapshot {
                            amplitude: source.amplitude(),
                            frequency_bins: analyzer.process(&source.recent_samples()),
                            recorded_secs: source.recorded_secs(),
                        };
                        // Checked under the channel lock so a snapshot can
                        // never land after the owner published its idle frame.
                        tx.send_if_modified(|current| {
                            if token.is_cancelled() {
                                return false;
                            }
                            *current = snapshot;
                            true
                        });
                    }
                }
            }
            log::trace!("feed: stopped");
        });

        Self { cancel, task }
    }

    /// Stop publishing.  No snapshot is sent after this returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LevelFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
