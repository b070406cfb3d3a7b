//! WAV export of a frozen recording.

use std::path::Path;

use tracing::info;

use crate::error::{ParlandoError, Result};

/// Write `samples` as mono 16-bit PCM at `sample_rate`, peak-normalized to
/// full scale before quantization.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Err(ParlandoError::EmptyRecording);
    }

    let peak = samples.iter().fold(0f32, |acc, s| acc.max(s.abs()));
    // An all-zero recording is written as silence rather than rejected.
    let gain = if peak > 0.0 { 1.0 / peak } else { 0.0 };

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| ParlandoError::Other(anyhow::anyhow!("wav create failed: {e}")))?;
    for &sample in samples {
        let scaled = (sample * gain * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32);
        writer
            .write_sample(scaled as i16)
            .map_err(|e| ParlandoError::Other(anyhow::anyhow!("wav write failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| ParlandoError::Other(anyhow::anyhow!("wav finalize failed: {e}")))?;

    info!(path = %path.display(), samples = samples.len(), sample_rate, "recording exported");
    Ok(())
}
