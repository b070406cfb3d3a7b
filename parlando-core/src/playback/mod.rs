//! Seekable playback over a frozen recording.
//!
//! The controller owns a *logical* cursor: a sample index derived from
//! wall-clock time elapsed since output started. The device's own playback
//! clock is never consulted — it is unreliable once a stream stops — so the
//! cursor is the single source of truth for pause/resume/seek math.
//!
//! A transient tracker thread advances the cursor every 100 ms while output
//! runs. `pause`/`seek` halt the device synchronously (sink `stop` joins the
//! stream thread) before the cursor is recomputed, so a stale elapsed-time
//! base can never leak into the next segment.

pub mod sink;

pub use sink::{AudioSink, NullSink};

#[cfg(feature = "audio-cpal")]
pub use sink::CpalSink;

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::error::{ParlandoError, Result};

/// Tracker poll interval; bounds cursor staleness and stop latency.
const TRACKER_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Play/pause/resume/seek over one frozen sample buffer.
pub struct PlaybackController {
    sink: Box<dyn AudioSink>,
    buffer: Option<Arc<Vec<f32>>>,
    sample_rate: u32,
    /// Logical sample index, 0 ≤ cursor ≤ buffer length.
    cursor: Arc<AtomicUsize>,
    state: Arc<Mutex<PlaybackState>>,
    /// Bumped on every output halt; trackers from older epochs stand down.
    epoch: Arc<AtomicU64>,
    tracker: Option<JoinHandle<()>>,
    /// Cursor value output last (re)started from.
    base: usize,
    /// When output last (re)started.
    started: Instant,
}

impl PlaybackController {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            sink,
            buffer: None,
            sample_rate: 0,
            cursor: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(Mutex::new(PlaybackState::Stopped)),
            epoch: Arc::new(AtomicU64::new(0)),
            tracker: None,
            base: 0,
            started: Instant::now(),
        }
    }

    /// Controller backed by the real output device.
    #[cfg(feature = "audio-cpal")]
    pub fn with_default_sink() -> Self {
        Self::new(Box::new(CpalSink::new()))
    }

    /// Load a frozen recording. Resets the cursor to 0 and stops any output.
    ///
    /// # Errors
    /// `ParlandoError::EmptyRecording` when `samples` is empty.
    pub fn load(&mut self, samples: Arc<Vec<f32>>, sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Err(ParlandoError::EmptyRecording);
        }
        self.halt_output();
        self.buffer = Some(samples);
        self.sample_rate = sample_rate;
        self.cursor.store(0, Ordering::Release);
        *self.state.lock() = PlaybackState::Stopped;
        info!(sample_rate, "recording loaded for playback");
        Ok(())
    }

    /// Start playback from the beginning.
    ///
    /// `play` restarts from sample 0 from *any* state, including `Paused`;
    /// `resume` is the only operation that continues from the frozen cursor.
    /// Device failures are logged and leave the controller `Stopped`.
    pub fn play(&mut self) {
        if self.buffer.is_none() {
            warn!("play requested with no recording loaded");
            return;
        }
        self.halt_output();
        self.cursor.store(0, Ordering::Release);
        self.start_from(0);
    }

    /// Freeze the cursor and halt output. No-op unless currently `Playing`.
    pub fn pause(&mut self) {
        if *self.state.lock() != PlaybackState::Playing {
            return;
        }
        // Snapshot the position from the elapsed-time base rather than the
        // last tracker tick, then halt before writing it back so no tracker
        // can race the store against a stale base.
        let frozen = self.elapsed_position();
        self.halt_output();
        self.cursor.store(frozen, Ordering::Release);
        *self.state.lock() = PlaybackState::Paused;
    }

    /// Continue from the frozen cursor. No-op unless currently `Paused`.
    pub fn resume(&mut self) {
        if *self.state.lock() != PlaybackState::Paused {
            return;
        }
        let base = self.cursor.load(Ordering::Acquire);
        self.start_from(base);
    }

    /// Skip forward or backward by `delta_secs`, then play from there.
    /// Valid from any state; the cursor is clamped to `[0, len]`.
    pub fn seek(&mut self, delta_secs: f64) {
        let Some(len) = self.buffer.as_ref().map(|b| b.len()) else {
            warn!("seek requested with no recording loaded");
            return;
        };
        let current = if *self.state.lock() == PlaybackState::Playing {
            self.elapsed_position()
        } else {
            self.cursor.load(Ordering::Acquire)
        };
        self.halt_output();
        let delta = (delta_secs * self.sample_rate as f64) as i64;
        let target = (current as i64 + delta).clamp(0, len as i64) as usize;
        self.cursor.store(target, Ordering::Release);
        self.start_from(target);
    }

    /// Discard the loaded recording and reset the cursor. Called implicitly
    /// when a new recording session starts.
    pub fn stop(&mut self) {
        self.halt_output();
        self.buffer = None;
        self.cursor.store(0, Ordering::Release);
        *self.state.lock() = PlaybackState::Stopped;
    }

    /// Current logical cursor, samples.
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Current logical cursor, seconds.
    pub fn position_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.position() as f64 / self.sample_rate as f64
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Cursor implied by wall-clock time since output started, clamped.
    fn elapsed_position(&self) -> usize {
        let len = self.buffer.as_ref().map(|b| b.len()).unwrap_or(0);
        let advanced = (self.started.elapsed().as_secs_f64() * self.sample_rate as f64) as usize;
        (self.base + advanced).min(len)
    }

    /// Start device output at `base` and spawn a fresh tracker.
    fn start_from(&mut self, base: usize) {
        let Some(buffer) = self.buffer.clone() else {
            return;
        };
        let len = buffer.len();
        if base >= len {
            self.cursor.store(len, Ordering::Release);
            *self.state.lock() = PlaybackState::Stopped;
            return;
        }

        match self.sink.start(buffer, base, self.sample_rate) {
            Ok(()) => {
                self.base = base;
                self.started = Instant::now();
                *self.state.lock() = PlaybackState::Playing;
                self.spawn_tracker(base, len);
            }
            Err(e) => {
                error!("playback output failed to start: {e}");
                *self.state.lock() = PlaybackState::Stopped;
            }
        }
    }

    /// Invalidate the tracker, join it, and stop the sink. When this returns
    /// the device is silent and no tracker will touch the cursor again.
    fn halt_output(&mut self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        if let Some(tracker) = self.tracker.take() {
            let _ = tracker.join();
        }
        self.sink.stop();
    }

    fn spawn_tracker(&mut self, base: usize, len: usize) {
        let cursor = Arc::clone(&self.cursor);
        let state = Arc::clone(&self.state);
        let epoch = Arc::clone(&self.epoch);
        let my_epoch = epoch.load(Ordering::Acquire);
        let sample_rate = self.sample_rate as f64;
        let started = self.started;

        self.tracker = Some(std::thread::spawn(move || loop {
            if epoch.load(Ordering::Acquire) != my_epoch {
                break;
            }
            let advanced = (started.elapsed().as_secs_f64() * sample_rate) as usize;
            let pos = (base + advanced).min(len);
            cursor.store(pos, Ordering::Release);
            if pos >= len {
                // Natural end of buffer; only transition if nobody has
                // restarted output in the meantime.
                if epoch.load(Ordering::Acquire) == my_epoch {
                    *state.lock() = PlaybackState::Stopped;
                }
                break;
            }
            std::thread::sleep(TRACKER_TICK);
        }));
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.halt_output();
    }
}
