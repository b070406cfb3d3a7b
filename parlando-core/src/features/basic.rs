//! `BasicExtractor` — built-in DSP backend.
//!
//! Deliberately modest: short-time RMS loudness and energy, a zero-crossing
//! speech-rate proxy, and a naive autocorrelation pitch estimate restricted
//! to the 50–500 Hz voice band. Enough to drive the metric plots while a
//! heavier analysis library is absent.

use crate::buffering::chunk::rms;
use crate::error::Result;
use crate::features::{FeatureExtractor, ProsodyFeatures};
use crate::segment::RmsSeries;

/// Loudness floor reported for silence, dBFS.
const LOUDNESS_FLOOR_DB: f32 = -60.0;
/// Voice band searched by the pitch estimator.
const PITCH_MIN_HZ: f32 = 50.0;
const PITCH_MAX_HZ: f32 = 500.0;
/// Pitch is estimated over at most this many samples to bound cost.
const PITCH_WINDOW: usize = 8_192;
/// Frame/hop used for the zero-crossing speech-rate proxy.
const ZCR_FRAME_LEN: usize = 2048;
const ZCR_HOP_LEN: usize = 512;

#[derive(Debug, Clone, Default)]
pub struct BasicExtractor;

impl BasicExtractor {
    pub fn new() -> Self {
        Self
    }

    fn loudness_db(samples: &[f32]) -> f32 {
        let level = rms(samples);
        if level <= 1e-6 {
            return LOUDNESS_FLOOR_DB;
        }
        (20.0 * level.log10()).max(LOUDNESS_FLOOR_DB)
    }

    /// Mean short-time RMS, matching the series the classifier consumes.
    fn energy(samples: &[f32], sample_rate: u32) -> f32 {
        let series = RmsSeries::from_samples(samples, sample_rate);
        if series.values.is_empty() {
            return 0.0;
        }
        series.values.iter().sum::<f32>() / series.values.len() as f32
    }

    /// Voiced-ish frames per second, from the per-frame zero-crossing rate.
    ///
    /// A frame counts as speech when its ZCR exceeds the chunk mean by a
    /// small margin; the count is normalised by chunk duration.
    fn speech_rate(samples: &[f32], sample_rate: u32) -> f32 {
        if samples.len() < ZCR_FRAME_LEN {
            return 0.0;
        }
        let mut rates = Vec::with_capacity(samples.len() / ZCR_HOP_LEN + 1);
        let mut start = 0usize;
        while start + ZCR_FRAME_LEN <= samples.len() {
            let frame = &samples[start..start + ZCR_FRAME_LEN];
            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            rates.push(crossings as f32 / ZCR_FRAME_LEN as f32);
            start += ZCR_HOP_LEN;
        }
        if rates.is_empty() {
            return 0.0;
        }
        let mean = rates.iter().sum::<f32>() / rates.len() as f32;
        let threshold = mean + 0.005;
        let speech_frames = rates.iter().filter(|&&r| r > threshold).count();
        let duration = samples.len() as f32 / sample_rate as f32;
        if duration > 0.0 {
            speech_frames as f32 / duration
        } else {
            0.0
        }
    }

    /// Autocorrelation pitch estimate in the voice band; 0 when unvoiced.
    fn pitch_hz(samples: &[f32], sample_rate: u32) -> f32 {
        let window = &samples[..samples.len().min(PITCH_WINDOW)];
        if rms(window) < 1e-4 {
            return 0.0;
        }
        let min_lag = (sample_rate as f32 / PITCH_MAX_HZ) as usize;
        let max_lag = (sample_rate as f32 / PITCH_MIN_HZ) as usize;
        if window.len() <= max_lag + 1 || min_lag == 0 {
            return 0.0;
        }

        let energy: f32 = window.iter().map(|s| s * s).sum();
        if energy <= 0.0 {
            return 0.0;
        }

        let mut best_lag = 0usize;
        let mut best_corr = 0.0f32;
        for lag in min_lag..=max_lag {
            let corr: f32 = window[..window.len() - lag]
                .iter()
                .zip(&window[lag..])
                .map(|(a, b)| a * b)
                .sum();
            if corr > best_corr {
                best_corr = corr;
                best_lag = lag;
            }
        }

        // Require meaningful periodicity before reporting a pitch.
        if best_lag == 0 || best_corr / energy < 0.3 {
            return 0.0;
        }
        sample_rate as f32 / best_lag as f32
    }
}

impl FeatureExtractor for BasicExtractor {
    fn extract(&mut self, samples: &[f32], sample_rate: u32) -> Result<ProsodyFeatures> {
        if samples.is_empty() || sample_rate == 0 {
            return Ok(ProsodyFeatures::neutral());
        }
        Ok(ProsodyFeatures {
            loudness_db: Self::loudness_db(samples),
            pitch_hz: Self::pitch_hz(samples, sample_rate),
            speech_rate: Self::speech_rate(samples, sample_rate),
            energy: Self::energy(samples, sample_rate),
        })
    }
}
