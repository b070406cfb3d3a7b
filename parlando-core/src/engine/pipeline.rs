//! Producer and consumer loops of the streaming pipeline.
//!
//! ## Producer (per iteration)
//!
//! ```text
//! 1. Drain capture ring → scratch buffer
//! 2. Append to the growing session buffer (producer is its only writer)
//! 3. Accumulate until one chunk duration is reached
//! 4. Push an AudioChunk onto the queue, clear the accumulator
//! ```
//!
//! ## Consumer (per chunk)
//!
//! ```text
//! 1. Pop one chunk (blocking with timeout; exits once
//!    `recording == false && queue empty` — drain-then-exit)
//! 2. Mean RMS < silence_threshold → emit silence notice, skip analysis
//! 3. Rate limiter: full analysis only if update_interval has elapsed
//! 4. FeatureExtractor + SegmentClassifier + EmotionAnalyzer
//! 5. Update MetricHistory, broadcast feedback + metric events
//! ```
//!
//! Both loops run under `spawn_blocking`, keeping the Tokio executor free.
//! Extraction failures are logged and skip the cycle; they never stop the
//! loops — only the recording flag does.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    buffering::{chunk::AudioChunk, CaptureConsumer, ChunkReceiver, ChunkSender, Consumer},
    config::AnalysisConfig,
    events::{ActivityEvent, FeedbackEvent, MetricUpdateEvent},
    features::{emotion, CameraFrame, EmotionHandle, ExtractorHandle, ProsodyFeatures},
    metrics::{Metric, MetricHistory},
    segment::{classify, RmsSeries, Segmentation},
};

/// Scratch size drained from the capture ring per producer iteration.
const DRAIN_CHUNK: usize = 4096;

/// Sleep when the ring is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY: Duration = Duration::from_millis(5);

/// Consumer blocking-pop timeout; bounds stop-flag observation latency.
const POP_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct PipelineDiagnostics {
    pub chunks_in: AtomicUsize,
    pub silent_chunks: AtomicUsize,
    pub analyses_run: AtomicUsize,
    pub extraction_errors: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.chunks_in.store(0, Ordering::Relaxed);
        self.silent_chunks.store(0, Ordering::Relaxed);
        self.analyses_run.store(0, Ordering::Relaxed);
        self.extraction_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_in: self.chunks_in.load(Ordering::Relaxed),
            silent_chunks: self.silent_chunks.load(Ordering::Relaxed),
            analyses_run: self.analyses_run.load(Ordering::Relaxed),
            extraction_errors: self.extraction_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub chunks_in: usize,
    pub silent_chunks: usize,
    pub analyses_run: usize,
    pub extraction_errors: usize,
}

/// Everything the producer loop needs.
pub struct ProducerContext {
    pub ring: CaptureConsumer,
    pub chunk_tx: ChunkSender,
    /// Growing session buffer; the producer is its only writer.
    pub session: Arc<Mutex<Vec<f32>>>,
    pub recording: Arc<AtomicBool>,
    /// Set once the producer has exited and the session buffer is final.
    pub sealed: Arc<AtomicBool>,
    pub sample_rate: u32,
    pub chunk_samples: usize,
}

/// Drain the capture ring into session buffer + chunk queue until the
/// recording flag clears and the ring is empty.
pub fn run_producer(mut ctx: ProducerContext) {
    info!(
        sample_rate = ctx.sample_rate,
        chunk_samples = ctx.chunk_samples,
        "producer started"
    );
    let chunk_samples = ctx.chunk_samples.max(1);
    let mut scratch = vec![0f32; DRAIN_CHUNK];
    let mut accumulator: Vec<f32> = Vec::with_capacity(chunk_samples);

    loop {
        let n = ctx.ring.pop_slice(&mut scratch);
        if n == 0 {
            if !ctx.recording.load(Ordering::Acquire) {
                break;
            }
            std::thread::sleep(SLEEP_EMPTY);
            continue;
        }

        ctx.session.lock().extend_from_slice(&scratch[..n]);
        accumulator.extend_from_slice(&scratch[..n]);

        while accumulator.len() >= chunk_samples {
            let rest = accumulator.split_off(chunk_samples);
            let chunk = AudioChunk::new(
                std::mem::replace(&mut accumulator, rest),
                ctx.sample_rate,
            );
            debug!(samples = chunk.samples.len(), "chunk pushed");
            if ctx.chunk_tx.send(chunk).is_err() {
                warn!("chunk queue closed; producer exiting");
                ctx.sealed.store(true, Ordering::Release);
                return;
            }
        }
    }

    // Frames in flight when stop was observed still reach the consumer.
    if !accumulator.is_empty() {
        debug!(samples = accumulator.len(), "flushing partial final chunk");
        let _ = ctx
            .chunk_tx
            .send(AudioChunk::new(accumulator, ctx.sample_rate));
    }
    ctx.sealed.store(true, Ordering::Release);
    info!("producer stopped");
}

/// Everything the consumer loop needs.
pub struct ConsumerContext {
    pub config: AnalysisConfig,
    pub extractor: ExtractorHandle,
    pub emotion: Option<EmotionHandle>,
    /// Latest webcam frame stashed by the display layer, if any.
    pub camera_frame: Arc<Mutex<Option<CameraFrame>>>,
    pub history: Arc<MetricHistory>,
    pub recording: Arc<AtomicBool>,
    pub chunk_rx: ChunkReceiver,
    pub feedback_tx: broadcast::Sender<FeedbackEvent>,
    pub metric_tx: broadcast::Sender<MetricUpdateEvent>,
    pub activity_tx: broadcast::Sender<ActivityEvent>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Consume chunks until the recording flag clears *and* the queue is empty.
pub fn run_consumer(ctx: ConsumerContext) {
    info!("consumer started");
    let mut activity_seq = 0u64;
    // None → the first qualifying chunk is analysed immediately.
    let mut last_analysis: Option<Instant> = None;

    while ctx.recording.load(Ordering::Acquire) || !ctx.chunk_rx.is_empty() {
        let chunk = match ctx.chunk_rx.recv_timeout(POP_TIMEOUT) {
            Ok(chunk) => chunk,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        ctx.diagnostics.chunks_in.fetch_add(1, Ordering::Relaxed);

        let rms = chunk.mean_rms();
        let silent = rms < ctx.config.silence_threshold;
        let _ = ctx.activity_tx.send(ActivityEvent {
            seq: activity_seq,
            rms,
            silent,
        });
        activity_seq = activity_seq.saturating_add(1);

        if silent {
            ctx.diagnostics.silent_chunks.fetch_add(1, Ordering::Relaxed);
            emit_feedback(
                &ctx,
                "Below the silence threshold, no analysis is being performed.".to_string(),
            );
            continue;
        }

        // Rate limiter: chunks arrive faster than full analysis should run.
        // Skipped chunks were still silence-checked above.
        let due = last_analysis
            .map(|t| t.elapsed().as_secs_f64() >= ctx.config.update_interval)
            .unwrap_or(true);
        if !due {
            continue;
        }

        let features = match ctx
            .extractor
            .0
            .lock()
            .extract(&chunk.samples, chunk.sample_rate)
        {
            Ok(features) => features,
            Err(e) => {
                ctx.diagnostics
                    .extraction_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!("feature extraction failed, cycle skipped: {e}");
                continue;
            }
        };

        let series = RmsSeries::from_samples(&chunk.samples, chunk.sample_rate);
        let segmentation = classify(&series, &ctx.config);

        for (metric, value) in [
            (Metric::Loudness, features.loudness_db),
            (Metric::Pitch, features.pitch_hz),
            (Metric::SpeechRate, features.speech_rate),
            (Metric::Energy, features.energy),
        ] {
            ctx.history.push(metric, value);
            let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
            let _ = ctx.metric_tx.send(MetricUpdateEvent {
                seq,
                metric,
                value,
                band: metric.default_bands().band(value),
            });
        }

        let mut text = feedback_line(&features, &segmentation, &ctx.config);
        if let Some(line) = emotion_line(&ctx) {
            text.push('\n');
            text.push_str(&line);
        }
        emit_feedback(&ctx, text);

        ctx.diagnostics.analyses_run.fetch_add(1, Ordering::Relaxed);
        last_analysis = Some(Instant::now());
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        chunks_in = snap.chunks_in,
        silent_chunks = snap.silent_chunks,
        analyses_run = snap.analyses_run,
        extraction_errors = snap.extraction_errors,
        "consumer stopped — diagnostics"
    );
}

fn emit_feedback(ctx: &ConsumerContext, text: String) {
    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let _ = ctx.feedback_tx.send(FeedbackEvent { seq, text });
}

/// Qualitative loudness verdict plus the pause/break summary.
fn feedback_line(
    features: &ProsodyFeatures,
    segmentation: &Segmentation,
    config: &AnalysisConfig,
) -> String {
    let loudness = if features.loudness_db > config.loudness_threshold_db + 8.0 {
        format!("Loud: {:.2} dB.", features.loudness_db)
    } else if features.loudness_db < config.loudness_threshold_db - 8.0 {
        format!("Quiet: {:.2} dB.", features.loudness_db)
    } else {
        format!("Balanced: {:.2} dB.", features.loudness_db)
    };
    format!("{} {}", loudness, segmentation.summary())
}

/// Score the stashed camera frame, if an analyzer and a frame exist.
fn emotion_line(ctx: &ConsumerContext) -> Option<String> {
    let analyzer = ctx.emotion.as_ref()?;
    let frame = ctx.camera_frame.lock().clone()?;
    let scores = analyzer.0.lock().analyse(&frame);
    emotion::summarize(&scores)
}
