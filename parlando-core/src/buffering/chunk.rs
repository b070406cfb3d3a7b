//! Typed audio chunk handed from the capture producer to the analysis consumer.

/// A contiguous block of mono PCM samples at a known sample rate.
///
/// Produced once per ~1 s of capture, consumed exactly once.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Root-mean-square level over the whole chunk. Empty chunks are 0.
    pub fn mean_rms(&self) -> f32 {
        rms(&self.samples)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// RMS of a sample slice; 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}
