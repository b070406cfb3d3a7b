//! Analysis configuration (optional JSON file, defaults otherwise).
//!
//! The original system kept these as mutable settings shared across
//! components; here they are loaded once, normalized, and passed by value
//! through constructors. Nothing mutates an `AnalysisConfig` after load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables shared by the pipeline, the segment classifier and the metric
/// history. All durations are seconds, all thresholds linear energy unless
/// the field name says dB.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum below-threshold run to count as a pause at all.
    pub pause_duration: f64,
    /// Minimum below-threshold run to escalate a pause to a break.
    pub break_duration: f64,
    /// RMS gate under which a frame counts toward a pause/break.
    pub pause_threshold_value: f32,
    /// Minimum wall-clock spacing between full feature-extraction cycles.
    pub update_interval: f64,
    /// Mean-RMS gate under which a whole chunk is skipped as silence.
    pub silence_threshold: f32,
    /// Reference loudness for qualitative feedback text.
    pub loudness_threshold_db: f32,
    /// Capture and playback sample rate (Hz).
    pub sample_rate: u32,
    /// Duration of one producer chunk.
    pub chunk_duration: f64,
    /// Rolling history capacity per metric.
    pub history_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pause_duration: 0.3,
            break_duration: 7.0,
            pause_threshold_value: 0.001,
            update_interval: 5.0,
            silence_threshold: 0.008,
            loudness_threshold_db: -25.0,
            sample_rate: 44_100,
            chunk_duration: 1.0,
            history_capacity: 50,
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file, falling back to defaults on any error.
    /// A missing or corrupt config file is never fatal.
    pub fn load(path: &Path) -> Self {
        let mut config = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<AnalysisConfig>(&raw) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), "config parse failed ({e}), using defaults");
                    AnalysisConfig::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), "config not readable ({e}), using defaults");
                AnalysisConfig::default()
            }
        };
        config.normalize();
        config
    }

    /// Clamp every field into a workable range.
    pub fn normalize(&mut self) {
        self.pause_duration = self.pause_duration.clamp(0.05, 10.0);
        self.break_duration = self.break_duration.clamp(self.pause_duration, 60.0);
        self.pause_threshold_value = self.pause_threshold_value.clamp(0.0, 0.5);
        self.update_interval = self.update_interval.clamp(0.1, 60.0);
        self.silence_threshold = self.silence_threshold.clamp(0.0, 0.5);
        self.loudness_threshold_db = self.loudness_threshold_db.clamp(-80.0, 0.0);
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.chunk_duration = self.chunk_duration.clamp(0.1, 10.0);
        self.history_capacity = self.history_capacity.clamp(4, 10_000);
    }

    /// Samples per producer chunk at the configured rate.
    pub fn chunk_samples(&self) -> usize {
        (self.chunk_duration * self.sample_rate as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AnalysisConfig::load(Path::new("/nonexistent/parlando.json"));
        assert_eq!(config.sample_rate, 44_100);
        assert!((config.update_interval - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join("parlando-corrupt-config.json");
        fs::write(&path, "{not json").unwrap();
        let config = AnalysisConfig::load(&path);
        assert!((config.pause_duration - 0.3).abs() < f64::EPSILON);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join("parlando-partial-config.json");
        fs::write(&path, r#"{"updateInterval": 2.0}"#).unwrap();
        let config = AnalysisConfig::load(&path);
        assert!((config.update_interval - 2.0).abs() < f64::EPSILON);
        assert!((config.silence_threshold - 0.008).abs() < f32::EPSILON);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn normalize_clamps_degenerate_values() {
        let mut config = AnalysisConfig {
            pause_duration: 0.0,
            break_duration: 0.0,
            update_interval: 0.0,
            sample_rate: 1,
            history_capacity: 0,
            ..AnalysisConfig::default()
        };
        config.normalize();
        assert!(config.pause_duration >= 0.05);
        assert!(config.break_duration >= config.pause_duration);
        assert!(config.update_interval >= 0.1);
        assert!(config.sample_rate >= 8_000);
        assert!(config.history_capacity >= 4);
    }

    #[test]
    fn chunk_samples_matches_rate_and_duration() {
        let config = AnalysisConfig::default();
        assert_eq!(config.chunk_samples(), 44_100);
    }
}
