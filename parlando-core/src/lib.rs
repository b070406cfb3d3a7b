//! # parlando-core
//!
//! Reusable prosody-analysis engine SDK: live capture, pause/break
//! segmentation, rolling metric history, seekable playback, WAV export.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SPSC RingBuffer → producer(spawn_blocking)
//!                                                    │  1 s AudioChunks
//!                                              chunk queue (crossbeam)
//!                                                    │
//!                                          consumer(spawn_blocking)
//!                                          silence gate → rate limiter
//!                                                    │
//!                                   FeatureExtractor + pause/break classify
//!                                                    │
//!                              broadcast: Feedback / MetricUpdate / Activity
//! ```
//!
//! The audio callback is zero-alloc. All heap work happens in the producer
//! and consumer tasks.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod features;
pub mod metrics;
pub mod playback;
pub mod segment;

// Convenience re-exports for downstream crates
pub use config::AnalysisConfig;
pub use engine::{AnalyserEngine, Recording};
pub use error::ParlandoError;
pub use events::{
    ActivityEvent, EngineStatus, EngineStatusEvent, FeedbackEvent, MetricUpdateEvent,
};
pub use features::{
    BasicExtractor, CameraFrame, EmotionAnalyzer, EmotionHandle, EmotionScore, ExtractorHandle,
    FeatureExtractor, ProsodyFeatures,
};
pub use metrics::{Band, BandThresholds, Metric, MetricHistory};
pub use playback::{PlaybackController, PlaybackState};
pub use segment::{Interval, IntervalKind, RmsSeries, Segmentation};
