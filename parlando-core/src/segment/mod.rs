//! Pause/break segmentation over a frame-level RMS series.
//!
//! ## Algorithm
//!
//! Single left-to-right scan, O(n):
//!
//! 1. Convert `pause_duration` / `break_duration` into frame counts using the
//!    series' hop spacing (floor-clamped so degenerate series can't divide
//!    toward infinity).
//! 2. Track one open run of below-threshold frames.
//! 3. On the first frame back at or above threshold, close the run: long
//!    enough → emit a `Pause` or `Break` interval; too short → discard as
//!    noise.
//! 4. At series end, flush a still-open run that meets the minimum. A
//!    recording that ends mid-silence therefore still produces a terminal
//!    interval.
//!
//! The threshold test is strict `<`: a frame exactly at the gate counts as
//! speech.

use serde::{Deserialize, Serialize};

use crate::buffering::chunk::rms;
use crate::config::AnalysisConfig;

/// Floor for the hop spacing when converting durations to frame counts.
const MIN_HOP_SECS: f64 = 0.01;

/// Frame length used when deriving an RMS series from raw samples.
pub const RMS_FRAME_LEN: usize = 2048;
/// Hop length used when deriving an RMS series from raw samples.
pub const RMS_HOP_LEN: usize = 512;

/// Uniformly spaced frame-level RMS values.
#[derive(Debug, Clone)]
pub struct RmsSeries {
    pub values: Vec<f32>,
    /// Spacing between consecutive frames, seconds.
    pub hop_secs: f64,
}

impl RmsSeries {
    pub fn new(values: Vec<f32>, hop_secs: f64) -> Self {
        Self { values, hop_secs }
    }

    /// Short-time RMS of `samples` at a fixed hop.
    ///
    /// The final partial frame is included so trailing silence is not lost.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        let hop_secs = RMS_HOP_LEN as f64 / sample_rate as f64;
        if samples.is_empty() {
            return Self::new(Vec::new(), hop_secs);
        }
        let mut values = Vec::with_capacity(samples.len() / RMS_HOP_LEN + 1);
        let mut start = 0usize;
        while start < samples.len() {
            let end = (start + RMS_FRAME_LEN).min(samples.len());
            values.push(rms(&samples[start..end]));
            start += RMS_HOP_LEN;
        }
        Self::new(values, hop_secs)
    }

    /// Timestamp of frame `i`, seconds from series start.
    fn time_at(&self, i: usize) -> f64 {
        i as f64 * self.hop_secs
    }
}

/// Whether a below-threshold interval is a short pause or a long break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    Pause,
    Break,
}

/// One below-threshold interval in the series.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    /// Seconds from series start.
    pub start: f64,
    /// Seconds from series start; always > `start`.
    pub end: f64,
    pub duration: f64,
    pub kind: IntervalKind,
}

/// Classifier output: ordered, non-overlapping intervals plus summary counts.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub intervals: Vec<Interval>,
    pub pause_count: usize,
    pub break_count: usize,
    pub total_pause_secs: f64,
}

impl Segmentation {
    /// One-line summary for the feedback text.
    pub fn summary(&self) -> String {
        format!(
            "Detected {} pauses (total {:.2} sec) and {} breaks.",
            self.pause_count, self.total_pause_secs, self.break_count
        )
    }
}

/// Classify pauses and breaks in `series` against the configured gate.
pub fn classify(series: &RmsSeries, config: &AnalysisConfig) -> Segmentation {
    let hop = series.hop_secs.max(MIN_HOP_SECS);
    let min_pause_frames = (config.pause_duration / hop) as usize;
    let break_frames = (config.break_duration / hop) as usize;
    let threshold = config.pause_threshold_value;

    let mut out = Segmentation::default();
    // Open run: (start time, frames seen so far).
    let mut open: Option<(f64, usize)> = None;

    for (i, &value) in series.values.iter().enumerate() {
        if value < threshold {
            open = match open {
                None => Some((series.time_at(i), 1)),
                Some((start, count)) => Some((start, count + 1)),
            };
        } else if let Some((start, count)) = open.take() {
            if count >= min_pause_frames {
                push_interval(&mut out, start, series.time_at(i), count, break_frames);
            }
            // Runs shorter than the minimum are noise; dropped either way.
        }
    }

    if let Some((start, count)) = open {
        if count >= min_pause_frames && !series.values.is_empty() {
            let end = series.time_at(series.values.len() - 1);
            push_interval(&mut out, start, end, count, break_frames);
        }
    }

    out
}

fn push_interval(out: &mut Segmentation, start: f64, end: f64, count: usize, break_frames: usize) {
    let duration = end - start;
    let kind = if count >= break_frames {
        IntervalKind::Break
    } else {
        IntervalKind::Pause
    };
    match kind {
        IntervalKind::Break => out.break_count += 1,
        IntervalKind::Pause => {
            out.pause_count += 1;
            out.total_pause_secs += duration;
        }
    }
    out.intervals.push(Interval {
        start,
        end,
        duration,
        kind,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(pause: f64, brk: f64, threshold: f32) -> AnalysisConfig {
        AnalysisConfig {
            pause_duration: pause,
            break_duration: brk,
            pause_threshold_value: threshold,
            ..AnalysisConfig::default()
        }
    }

    fn series(values: Vec<f32>, hop: f64) -> RmsSeries {
        RmsSeries::new(values, hop)
    }

    #[test]
    fn all_loud_series_yields_no_intervals() {
        let s = series(vec![0.5; 40], 0.1);
        let out = classify(&s, &config(0.3, 0.8, 0.001));
        assert!(out.intervals.is_empty());
        assert_eq!(out.pause_count, 0);
        assert_eq!(out.break_count, 0);
    }

    #[test]
    fn all_silent_series_flushes_one_break_spanning_the_series() {
        // 30 frames at 0.1 s = 2.9 s span, break_duration 0.8 s → Break.
        let s = series(vec![0.0; 30], 0.1);
        let out = classify(&s, &config(0.3, 0.8, 0.001));
        assert_eq!(out.intervals.len(), 1);
        let iv = &out.intervals[0];
        assert_eq!(iv.kind, IntervalKind::Break);
        assert_abs_diff_eq!(iv.start, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(iv.end, 2.9, epsilon = 1e-9);
        assert_eq!(out.break_count, 1);
        assert_eq!(out.pause_count, 0);
    }

    #[test]
    fn all_silent_short_series_flushes_a_pause() {
        // 5 frames at 0.1 s: over the 0.3 s minimum but under the break bar.
        let s = series(vec![0.0; 5], 0.1);
        let out = classify(&s, &config(0.3, 7.0, 0.001));
        assert_eq!(out.intervals.len(), 1);
        assert_eq!(out.intervals[0].kind, IntervalKind::Pause);
    }

    #[test]
    fn frame_count_vs_duration_boundary_scenario() {
        // 20 frames at 0.1 s spacing; frames 5–14 sit below the gate.
        // pause_duration 0.3 s → 3 frames, break_duration 0.8 s → 8 frames.
        // The 10-frame run crosses the break bar.
        let mut values = vec![0.5f32; 20];
        for v in values.iter_mut().take(15).skip(5) {
            *v = 0.0005;
        }
        let s = series(values, 0.1);
        let out = classify(&s, &config(0.3, 0.8, 0.001));
        assert_eq!(out.intervals.len(), 1);
        let iv = &out.intervals[0];
        assert_eq!(iv.kind, IntervalKind::Break);
        assert_abs_diff_eq!(iv.start, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(iv.end, 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(iv.duration, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn value_exactly_at_threshold_counts_as_speech() {
        let mut values = vec![0.001f32; 10];
        values[4] = 0.0005;
        let s = series(values, 0.1);
        // A single below-threshold frame is under the 3-frame minimum.
        let out = classify(&s, &config(0.3, 7.0, 0.001));
        assert!(out.intervals.is_empty());
    }

    #[test]
    fn runs_shorter_than_minimum_are_discarded_as_noise() {
        let mut values = vec![0.5f32; 20];
        values[3] = 0.0;
        values[4] = 0.0;
        let s = series(values, 0.1);
        let out = classify(&s, &config(0.3, 7.0, 0.001));
        assert!(out.intervals.is_empty());
    }

    #[test]
    fn intervals_are_time_ordered_and_non_overlapping() {
        // Two silent regions separated by speech, plus trailing silence.
        let mut values = vec![0.5f32; 60];
        for v in values.iter_mut().take(10).skip(4) {
            *v = 0.0;
        }
        for v in values.iter_mut().take(35).skip(20) {
            *v = 0.0;
        }
        for v in values.iter_mut().skip(50) {
            *v = 0.0;
        }
        let s = series(values, 0.1);
        let out = classify(&s, &config(0.3, 1.2, 0.001));
        assert_eq!(out.intervals.len(), 3);
        for pair in out.intervals.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for iv in &out.intervals {
            assert!(iv.start < iv.end);
        }
    }

    #[test]
    fn degenerate_hop_is_floor_clamped() {
        // hop 1e-9 would make the frame minimum astronomically large without
        // the clamp; with it, 0.3 s / 0.01 s = 30 frames.
        let s = series(vec![0.0; 40], 1e-9);
        let out = classify(&s, &config(0.3, 7.0, 0.001));
        assert_eq!(out.intervals.len(), 1);
        assert_eq!(out.intervals[0].kind, IntervalKind::Pause);
    }

    #[test]
    fn summary_counts_pauses_and_breaks() {
        let mut values = vec![0.5f32; 40];
        for v in values.iter_mut().take(10).skip(5) {
            *v = 0.0; // 5 frames = 0.5 s → pause
        }
        for v in values.iter_mut().take(38).skip(20) {
            *v = 0.0; // 18 frames = 1.8 s → break
        }
        let s = series(values, 0.1);
        let out = classify(&s, &config(0.3, 1.2, 0.001));
        assert_eq!(out.pause_count, 1);
        assert_eq!(out.break_count, 1);
        assert!(out.summary().contains("1 pauses"));
        assert!(out.summary().contains("1 breaks"));
    }

    #[test]
    fn from_samples_covers_trailing_partial_frame() {
        // 3 full hops plus a remainder; every hop start yields a frame.
        let samples = vec![0.1f32; RMS_HOP_LEN * 3 + 100];
        let s = RmsSeries::from_samples(&samples, 44_100);
        assert_eq!(s.values.len(), 4);
        assert_abs_diff_eq!(s.hop_secs, 512.0 / 44_100.0, epsilon = 1e-12);
        for &v in &s.values {
            assert_abs_diff_eq!(v, 0.1, epsilon = 1e-6);
        }
    }

    #[test]
    fn from_samples_empty_input_yields_empty_series() {
        let s = RmsSeries::from_samples(&[], 44_100);
        assert!(s.values.is_empty());
        let out = classify(&s, &AnalysisConfig::default());
        assert!(out.intervals.is_empty());
    }
}
