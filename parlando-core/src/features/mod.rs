//! Collaborator seams for per-chunk feature extraction.
//!
//! The `FeatureExtractor` trait decouples the pipeline from any specific
//! analysis backend. `BasicExtractor` (default) carries modest built-in DSP;
//! a richer external library can be dropped in without touching the pipeline.
//!
//! `&mut self` on `extract` intentionally allows stateful backends (smoothing
//! filters, adaptive gates). All mutation is serialised through
//! `ExtractorHandle`'s `parking_lot::Mutex`.

pub mod basic;
pub mod emotion;

pub use basic::BasicExtractor;
pub use emotion::{CameraFrame, EmotionAnalyzer, EmotionHandle, EmotionScore, NullEmotionAnalyzer};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Scalar prosody features for one analysed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProsodyFeatures {
    /// Average loudness, dBFS.
    pub loudness_db: f32,
    /// Estimated average pitch, Hz. 0 when no pitch was found.
    pub pitch_hz: f32,
    /// Speech-rate proxy: voiced-ish frames per second.
    pub speech_rate: f32,
    /// Mean short-time RMS energy.
    pub energy: f32,
}

impl ProsodyFeatures {
    /// Neutral result for empty or degenerate input.
    pub fn neutral() -> Self {
        Self {
            loudness_db: -60.0,
            pitch_hz: 0.0,
            speech_rate: 0.0,
            energy: 0.0,
        }
    }
}

/// Contract for feature-extraction backends.
///
/// Implementations must not fail on empty or degenerate input — return
/// [`ProsodyFeatures::neutral`] instead. `Err` is reserved for real backend
/// failures; the consumer logs those and skips the cycle.
pub trait FeatureExtractor: Send + 'static {
    fn extract(&mut self, samples: &[f32], sample_rate: u32) -> Result<ProsodyFeatures>;
}

/// Thread-safe reference-counted handle to any `FeatureExtractor` implementor.
#[derive(Clone)]
pub struct ExtractorHandle(pub Arc<Mutex<dyn FeatureExtractor>>);

impl ExtractorHandle {
    pub fn new<E: FeatureExtractor>(extractor: E) -> Self {
        Self(Arc::new(Mutex::new(extractor)))
    }
}

impl std::fmt::Debug for ExtractorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorHandle").finish_non_exhaustive()
    }
}
