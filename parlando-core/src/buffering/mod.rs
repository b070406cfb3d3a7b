//! Sample transport between capture and analysis.
//!
//! Two stages, matching the two thread boundaries:
//! 1. cpal callback → producer task: lock-free SPSC ring (`ringbuf`), whose
//!    `push_slice` is wait-free and allocation-free as the real-time audio
//!    callback requires.
//! 2. producer task → consumer task: an unbounded `crossbeam-channel` of
//!    [`chunk::AudioChunk`]s. Every captured chunk is eventually delivered;
//!    the consumer rate-limits *analysis*, not delivery.

pub mod chunk;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Producer half of the capture ring — held by the audio callback.
pub type CaptureProducer = ringbuf::HeapProd<f32>;

/// Consumer half of the capture ring — held by the chunk-producer task.
pub type CaptureConsumer = ringbuf::HeapCons<f32>;

/// Ring capacity: 2^21 = 2 097 152 f32 samples ≈ 47.5 s at 44.1 kHz.
/// Plenty of headroom for the producer task to fall behind momentarily.
pub const RING_CAPACITY: usize = 1 << 21;

/// Create a matched producer/consumer pair backed by a heap-allocated ring.
pub fn create_capture_ring() -> (CaptureProducer, CaptureConsumer) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}

/// Sending side of the chunk queue (held by the producer task).
pub type ChunkSender = crossbeam_channel::Sender<chunk::AudioChunk>;

/// Receiving side of the chunk queue (held by the consumer task).
pub type ChunkReceiver = crossbeam_channel::Receiver<chunk::AudioChunk>;

/// Create the producer→consumer chunk queue.
///
/// Unbounded by design: chunks that arrive between analysis windows are still
/// consumed (for the silence check), so the queue never grows without bound
/// in practice — the consumer keeps pace with capture.
pub fn create_chunk_queue() -> (ChunkSender, ChunkReceiver) {
    crossbeam_channel::unbounded()
}
