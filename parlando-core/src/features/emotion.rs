//! Emotion-classification collaborator seam.
//!
//! The engine never depends on a concrete vision model; a display shell with
//! a webcam stashes frames in the engine's frame slot, and whatever analyzer
//! is plugged in scores the most recent one per analysis cycle. Failures are
//! swallowed into an empty score list and must never stop the pipeline.

use serde::{Deserialize, Serialize};

/// One decoded camera frame, row-major RGB8.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// One scored emotion label for a detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionScore {
    pub label: String,
    /// Confidence in [0.0, 1.0].
    pub score: f32,
}

/// Contract for emotion-classification backends.
pub trait EmotionAnalyzer: Send + 'static {
    /// Score the given frame. Returns an empty list when no face is found
    /// or the backend fails — errors never propagate.
    fn analyse(&mut self, frame: &CameraFrame) -> Vec<EmotionScore>;
}

/// Thread-safe reference-counted handle to any `EmotionAnalyzer` implementor.
#[derive(Clone)]
pub struct EmotionHandle(pub std::sync::Arc<parking_lot::Mutex<dyn EmotionAnalyzer>>);

impl EmotionHandle {
    pub fn new<A: EmotionAnalyzer>(analyzer: A) -> Self {
        Self(std::sync::Arc::new(parking_lot::Mutex::new(analyzer)))
    }
}

impl std::fmt::Debug for EmotionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionHandle").finish_non_exhaustive()
    }
}

/// Default analyzer: no model, no scores.
#[derive(Debug, Clone, Default)]
pub struct NullEmotionAnalyzer;

impl EmotionAnalyzer for NullEmotionAnalyzer {
    fn analyse(&mut self, _frame: &CameraFrame) -> Vec<EmotionScore> {
        Vec::new()
    }
}

/// Format a score list into one display line, most confident first.
pub fn summarize(scores: &[EmotionScore]) -> Option<String> {
    if scores.is_empty() {
        return None;
    }
    let mut ranked: Vec<&EmotionScore> = scores.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    let parts: Vec<String> = ranked
        .iter()
        .map(|s| format!("{} ({:.0}%)", s.label, s.score * 100.0))
        .collect();
    Some(format!("Face engagement: {}", parts.join(" | ")))
}
