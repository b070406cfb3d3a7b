//! `AnalyserEngine` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! AnalyserEngine::new()
//!     └─► start_recording()   → device open, producer + consumer spawned,
//!                               status = Recording
//!         └─► stop_recording() → flag cleared, producer flushes, consumer
//!                                drains, status = Stopped,
//!                                returns the frozen Recording
//! ```
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS. The capture handle is created
//! *inside* the producer's `spawn_blocking` closure and dropped there after
//! the producer loop ends; a sync mpsc channel propagates device-open errors
//! back to the `start_recording()` caller. The consumer runs in a second
//! blocking task and exits once the flag is clear and the queue is drained.

pub mod pipeline;

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    audio::AudioCapture,
    buffering::{create_capture_ring, create_chunk_queue},
    config::AnalysisConfig,
    error::{ParlandoError, Result},
    events::{ActivityEvent, EngineStatus, EngineStatusEvent, FeedbackEvent, MetricUpdateEvent},
    export,
    features::{CameraFrame, EmotionHandle, ExtractorHandle},
    metrics::MetricHistory,
};

/// Broadcast capacity: events buffered for slow display consumers.
const BROADCAST_CAP: usize = 256;

/// How long `stop_recording` waits for the producer to seal the session.
const SEAL_TIMEOUT: Duration = Duration::from_secs(2);
const SEAL_POLL: Duration = Duration::from_millis(20);

/// A frozen, immutable capture snapshot.
///
/// Cheap to clone; playback and export share the same sample storage.
#[derive(Debug, Clone)]
pub struct Recording {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
}

impl Recording {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Export as normalized mono 16-bit PCM WAV.
    pub fn export(&self, path: &Path) -> Result<()> {
        export::write_wav(path, &self.samples, self.sample_rate)
    }
}

/// The top-level engine handle.
///
/// `Send + Sync`; all fields use interior mutability. Wrap in `Arc` to share
/// between the display shell and event-forwarding tasks.
pub struct AnalyserEngine {
    config: AnalysisConfig,
    extractor: ExtractorHandle,
    emotion: Option<EmotionHandle>,
    camera_frame: Arc<Mutex<Option<CameraFrame>>>,
    history: Arc<MetricHistory>,
    /// `true` while the capture producer and consumer are active.
    recording: Arc<AtomicBool>,
    /// Set by the producer once the session buffer is final.
    sealed: Arc<AtomicBool>,
    /// Growing session buffer; appended to only by the producer task.
    session: Arc<Mutex<Vec<f32>>>,
    /// Actual device capture rate, known after `start_recording`.
    capture_rate: Arc<AtomicU32>,
    status: Arc<Mutex<EngineStatus>>,
    feedback_tx: broadcast::Sender<FeedbackEvent>,
    metric_tx: broadcast::Sender<MetricUpdateEvent>,
    activity_tx: broadcast::Sender<ActivityEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    seq: Arc<AtomicU64>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl AnalyserEngine {
    /// Create a new engine. Does not capture until `start_recording()`.
    pub fn new(config: AnalysisConfig, extractor: ExtractorHandle) -> Self {
        let (feedback_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (metric_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let history = Arc::new(MetricHistory::new(config.history_capacity));

        Self {
            config,
            extractor,
            emotion: None,
            camera_frame: Arc::new(Mutex::new(None)),
            history,
            recording: Arc::new(AtomicBool::new(false)),
            sealed: Arc::new(AtomicBool::new(true)),
            session: Arc::new(Mutex::new(Vec::new())),
            capture_rate: Arc::new(AtomicU32::new(0)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            feedback_tx,
            metric_tx,
            activity_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        }
    }

    /// Attach an emotion-classification collaborator.
    pub fn with_emotion_analyzer(mut self, analyzer: EmotionHandle) -> Self {
        self.emotion = Some(analyzer);
        self
    }

    /// Stash the most recent webcam frame for the next analysis cycle.
    pub fn set_camera_frame(&self, frame: CameraFrame) {
        *self.camera_frame.lock() = Some(frame);
    }

    /// Start audio capture and the analysis pipeline.
    ///
    /// Blocks until the audio device is confirmed open (or fails), then
    /// returns; capture and analysis continue in background blocking tasks.
    ///
    /// # Errors
    /// - `ParlandoError::AlreadyRecording` if already started.
    /// - Device errors (`NoDefaultInputDevice`, `AudioStream`) — the engine
    ///   stays `Error`/not-recording, nothing is spawned beyond cleanup.
    pub fn start_recording(&self) -> Result<()> {
        if self.recording.load(Ordering::SeqCst) {
            return Err(ParlandoError::AlreadyRecording);
        }

        self.diagnostics.reset();
        self.history.clear();
        self.session.lock().clear();
        self.sealed.store(false, Ordering::SeqCst);
        self.recording.store(true, Ordering::SeqCst);
        self.set_status(EngineStatus::Recording, None);

        let (ring_producer, ring_consumer) = create_capture_ring();
        let (chunk_tx, chunk_rx) = create_chunk_queue();

        // Sync oneshot: producer thread signals open success/failure (with
        // the actual capture rate) back to this caller.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        let config = self.config.clone();
        let recording = Arc::clone(&self.recording);
        let sealed = Arc::clone(&self.sealed);
        let session = Arc::clone(&self.session);
        let capture_rate = Arc::clone(&self.capture_rate);

        tokio::task::spawn_blocking(move || {
            // Device must be opened on THIS thread — cpal::Stream is !Send.
            let capture = match AudioCapture::open_default(ring_producer, Arc::clone(&recording))
            {
                Ok(c) => {
                    let _ = open_tx.send(Ok(c.sample_rate));
                    c
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    recording.store(false, Ordering::SeqCst);
                    sealed.store(true, Ordering::SeqCst);
                    return;
                }
            };
            let sample_rate = capture.sample_rate;
            capture_rate.store(sample_rate, Ordering::SeqCst);

            let chunk_samples =
                (config.chunk_duration * sample_rate as f64).max(1.0) as usize;
            pipeline::run_producer(pipeline::ProducerContext {
                ring: ring_consumer,
                chunk_tx,
                session,
                recording,
                sealed,
                sample_rate,
                chunk_samples,
            });

            // Stream drops here, releasing the device on its own thread.
            drop(capture);
        });

        let consumer_ctx = pipeline::ConsumerContext {
            config: self.config.clone(),
            extractor: self.extractor.clone(),
            emotion: self.emotion.clone(),
            camera_frame: Arc::clone(&self.camera_frame),
            history: Arc::clone(&self.history),
            recording: Arc::clone(&self.recording),
            chunk_rx,
            feedback_tx: self.feedback_tx.clone(),
            metric_tx: self.metric_tx.clone(),
            activity_tx: self.activity_tx.clone(),
            seq: Arc::clone(&self.seq),
            diagnostics: Arc::clone(&self.diagnostics),
        };
        tokio::task::spawn_blocking(move || pipeline::run_consumer(consumer_ctx));

        match open_rx.recv() {
            Ok(Ok(rate)) => {
                info!(sample_rate = rate, "recording started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.recording.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                self.recording.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some("capture task died".into()));
                Err(ParlandoError::Other(anyhow::anyhow!(
                    "capture task died before confirming device open"
                )))
            }
        }
    }

    /// Stop capture, wait for the producer to seal the session buffer, and
    /// return the frozen recording.
    ///
    /// The consumer keeps draining queued chunks in the background; only the
    /// session buffer is awaited here.
    ///
    /// # Errors
    /// - `ParlandoError::NotRecording` if not currently recording.
    /// - `ParlandoError::EmptyRecording` if nothing was captured.
    pub fn stop_recording(&self) -> Result<Recording> {
        if !self.recording.load(Ordering::SeqCst) {
            return Err(ParlandoError::NotRecording);
        }

        self.recording.store(false, Ordering::SeqCst);
        info!("recording stop requested");

        let deadline = std::time::Instant::now() + SEAL_TIMEOUT;
        while !self.sealed.load(Ordering::SeqCst) {
            if std::time::Instant::now() >= deadline {
                warn!("producer did not seal the session in time; snapshotting anyway");
                break;
            }
            std::thread::sleep(SEAL_POLL);
        }

        self.set_status(EngineStatus::Stopped, None);
        let samples = Arc::new(self.session.lock().clone());
        if samples.is_empty() {
            return Err(ParlandoError::EmptyRecording);
        }
        Ok(Recording {
            samples,
            sample_rate: self.capture_rate.load(Ordering::SeqCst),
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Rolling metric histories (shared, read-only use expected).
    pub fn history(&self) -> Arc<MetricHistory> {
        Arc::clone(&self.history)
    }

    pub fn subscribe_feedback(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.feedback_tx.subscribe()
    }

    pub fn subscribe_metrics(&self) -> broadcast::Receiver<MetricUpdateEvent> {
        self.metric_tx.subscribe()
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityEvent> {
        self.activity_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::BasicExtractor;

    fn engine() -> AnalyserEngine {
        AnalyserEngine::new(
            AnalysisConfig::default(),
            ExtractorHandle::new(BasicExtractor::new()),
        )
    }

    #[test]
    fn stop_without_start_is_an_error() {
        let engine = engine();
        assert!(matches!(
            engine.stop_recording(),
            Err(ParlandoError::NotRecording)
        ));
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn recording_duration_math() {
        let recording = Recording {
            samples: Arc::new(vec![0.0; 88_200]),
            sample_rate: 44_100,
        };
        assert!((recording.duration_secs() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_rate_recording_reports_zero_duration() {
        let recording = Recording {
            samples: Arc::new(vec![0.0; 100]),
            sample_rate: 0,
        };
        assert_eq!(recording.duration_secs(), 0.0);
    }
}
