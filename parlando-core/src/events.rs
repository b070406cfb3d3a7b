//! Event types broadcast by the analyser engine.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a display
//! shell can forward them over whatever bus it uses unchanged.

use serde::{Deserialize, Serialize};

use crate::metrics::{Band, Metric};

/// Emitted when the consumer finishes a full analysis cycle (or hits the
/// silence gate) and has feedback text for the display layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub text: String,
}

/// One metric value from a full analysis cycle, pre-classified into a
/// display band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricUpdateEvent {
    pub seq: u64,
    pub metric: Metric,
    pub value: f32,
    pub band: Band,
}

/// Per-chunk activity: mean RMS plus the silence-gate decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub seq: u64,
    pub rms: f32,
    pub silent: bool,
}

/// Emitted when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. device error message).
    pub detail: Option<String>,
}

/// Current state of the analyser engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created, no capture running.
    Idle,
    /// Actively capturing and analysing audio.
    Recording,
    /// Capture stopped; a frozen recording is available.
    Stopped,
    /// Device or pipeline failure — recording did not start.
    Error,
}
