//! Microphone capture via cpal.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not allocate, block on a lock, or perform I/O. The callback here
//! only mixes to mono into a pre-grown scratch buffer and calls the ring
//! producer's lock-free `push_slice`.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms. `AudioCapture` must be
//! created and dropped on the same OS thread; the engine does both inside
//! one `spawn_blocking` closure.

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, StreamConfig,
};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[cfg(feature = "audio-cpal")]
use crate::buffering::Producer;
use crate::{
    buffering::CaptureProducer,
    error::{ParlandoError, Result},
};

#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active capture stream.
///
/// **Not `Send`** — bound to its creation thread.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: cpal::Stream,
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
impl AudioCapture {
    /// Open the default microphone and push mono f32 frames into `producer`.
    ///
    /// The callback no-ops once `running` goes false, so the producer task can
    /// drain the ring and exit without racing the device.
    ///
    /// # Errors
    /// `ParlandoError::NoDefaultInputDevice` when no microphone exists,
    /// `ParlandoError::AudioDevice`/`AudioStream` when cpal refuses the
    /// config or stream. Callers treat these as "recording did not start".
    pub fn open_default(mut producer: CaptureProducer, running: Arc<AtomicBool>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(ParlandoError::NoDefaultInputDevice)?;

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| ParlandoError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(sample_rate, channels, "capture config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let running_cb = Arc::clone(&running);
        let ch = channels as usize;
        let mut mix_buf: Vec<f32> = Vec::new();

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    if !running_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    push_mono(&mut producer, &mut mix_buf, data, ch, |s| s);
                },
                |err| error!("capture stream error: {err}"),
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    if !running_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    push_mono(&mut producer, &mut mix_buf, data, ch, |s| {
                        s as f32 / 32_768.0
                    });
                },
                |err| error!("capture stream error: {err}"),
                None,
            ),
            fmt => {
                return Err(ParlandoError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| ParlandoError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| ParlandoError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }
}

/// Mix an interleaved callback buffer down to mono and push it into the ring.
///
/// `mix_buf` lives across callbacks; after the first invocation `resize` is
/// a no-op, keeping the hot path allocation-free.
#[cfg(feature = "audio-cpal")]
fn push_mono<S: Copy>(
    producer: &mut CaptureProducer,
    mix_buf: &mut Vec<f32>,
    data: &[S],
    channels: usize,
    to_f32: impl Fn(S) -> f32,
) {
    let frames = data.len() / channels.max(1);
    mix_buf.resize(frames, 0.0);
    for f in 0..frames {
        let base = f * channels;
        let mut sum = 0f32;
        for c in 0..channels {
            sum += to_f32(data[base + c]);
        }
        mix_buf[f] = sum / channels as f32;
    }
    let written = producer.push_slice(mix_buf);
    if written < mix_buf.len() {
        warn!(
            dropped = mix_buf.len() - written,
            "capture ring full, dropping frames"
        );
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_default(_producer: CaptureProducer, _running: Arc<AtomicBool>) -> Result<Self> {
        Err(ParlandoError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

impl AudioCapture {
    /// Signal the callback to no-op from its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
