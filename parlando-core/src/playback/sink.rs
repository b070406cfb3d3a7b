//! Audio output seam.
//!
//! The controller never talks to cpal directly; it drives an `AudioSink`.
//! `CpalSink` is the real device, `NullSink` keeps headless builds and tests
//! working. Either way the device is write-only: nothing in the crate reads
//! a playback position back from it.

use std::sync::Arc;

use crate::error::Result;

/// Contract for playback output devices.
///
/// `start` begins emitting `buffer[start..]` and returns once the device is
/// confirmed running (or refuses). `stop` halts output synchronously — when
/// it returns, no more samples reach the device.
pub trait AudioSink: Send + 'static {
    fn start(&mut self, buffer: Arc<Vec<f32>>, start: usize, sample_rate: u32) -> Result<()>;
    fn stop(&mut self);
}

/// Sink that discards audio. Used in tests and non-cpal builds.
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn start(&mut self, _buffer: Arc<Vec<f32>>, _start: usize, _sample_rate: u32) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}

#[cfg(feature = "audio-cpal")]
pub use cpal_sink::CpalSink;

#[cfg(feature = "audio-cpal")]
mod cpal_sink {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    };
    use std::thread::JoinHandle;
    use std::time::Duration;

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        SampleRate, StreamConfig,
    };
    use tracing::{error, info};

    use super::AudioSink;
    use crate::error::{ParlandoError, Result};

    /// How often the owning thread polls for stop/completion.
    const SINK_POLL: Duration = Duration::from_millis(50);

    /// cpal-backed output sink.
    ///
    /// `cpal::Stream` is `!Send`, so each `start` spawns a thread that owns
    /// the stream for its whole life; `stop` signals the thread and joins it.
    #[derive(Default)]
    pub struct CpalSink {
        halt: Option<Arc<AtomicBool>>,
        thread: Option<JoinHandle<()>>,
    }

    impl CpalSink {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl AudioSink for CpalSink {
        fn start(&mut self, buffer: Arc<Vec<f32>>, start: usize, sample_rate: u32) -> Result<()> {
            self.stop();

            let halt = Arc::new(AtomicBool::new(false));
            let halt_thread = Arc::clone(&halt);
            // Confirms device open before start() returns, mirroring how
            // capture open is confirmed on the input side.
            let (open_tx, open_rx) = mpsc::channel::<Result<()>>();

            let thread = std::thread::spawn(move || {
                let host = cpal::default_host();
                let device = match host.default_output_device() {
                    Some(d) => d,
                    None => {
                        let _ = open_tx.send(Err(ParlandoError::NoDefaultOutputDevice));
                        return;
                    }
                };
                info!(
                    device = device.name().unwrap_or_default().as_str(),
                    start, "opening output device"
                );

                let channels = device
                    .default_output_config()
                    .map(|c| c.channels())
                    .unwrap_or(2);
                let config = StreamConfig {
                    channels,
                    sample_rate: SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let done = Arc::new(AtomicBool::new(false));
                let done_cb = Arc::clone(&done);
                let ch = channels as usize;
                let mut pos = start.min(buffer.len());

                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _info| {
                        for frame in data.chunks_mut(ch) {
                            let sample = buffer.get(pos).copied().unwrap_or(0.0);
                            for out in frame.iter_mut() {
                                *out = sample;
                            }
                            if pos < buffer.len() {
                                pos += 1;
                            }
                        }
                        if pos >= buffer.len() {
                            done_cb.store(true, Ordering::Release);
                        }
                    },
                    |err| error!("output stream error: {err}"),
                    None,
                );

                let stream = match stream.map_err(|e| ParlandoError::AudioStream(e.to_string())) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = open_tx.send(Err(ParlandoError::AudioStream(e.to_string())));
                    return;
                }
                let _ = open_tx.send(Ok(()));

                while !halt_thread.load(Ordering::Acquire) && !done.load(Ordering::Acquire) {
                    std::thread::sleep(SINK_POLL);
                }
                // Stream drops here, on its owning thread.
            });

            match open_rx.recv() {
                Ok(Ok(())) => {
                    self.halt = Some(halt);
                    self.thread = Some(thread);
                    Ok(())
                }
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => {
                    let _ = thread.join();
                    Err(ParlandoError::AudioStream(
                        "output thread died before confirming open".into(),
                    ))
                }
            }
        }

        fn stop(&mut self) {
            if let Some(halt) = self.halt.take() {
                halt.store(true, Ordering::Release);
            }
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    impl Drop for CpalSink {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
