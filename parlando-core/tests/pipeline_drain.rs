use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use parlando_core::buffering::{create_capture_ring, create_chunk_queue, Producer};
use parlando_core::engine::pipeline;
use parlando_core::{
    ActivityEvent, AnalysisConfig, ExtractorHandle, FeatureExtractor, FeedbackEvent,
    MetricHistory, ProsodyFeatures,
};

const RATE: u32 = 16_000;
const CHUNK: usize = 1_600; // 0.1 s

struct CountingExtractor {
    calls: Arc<AtomicUsize>,
}

impl FeatureExtractor for CountingExtractor {
    fn extract(
        &mut self,
        _samples: &[f32],
        _sample_rate: u32,
    ) -> parlando_core::error::Result<ProsodyFeatures> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProsodyFeatures {
            loudness_db: -20.0,
            pitch_hz: 180.0,
            speech_rate: 25.0,
            energy: 0.02,
        })
    }
}

fn recv_with_timeout<T: Clone>(rx: &mut broadcast::Receiver<T>, timeout: Duration) -> T {
    let start = Instant::now();
    loop {
        match rx.try_recv() {
            Ok(ev) => return ev,
            Err(TryRecvError::Empty) => {
                if start.elapsed() >= timeout {
                    panic!("timed out waiting for event");
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => panic!("event channel closed unexpectedly"),
        }
    }
}

/// End-to-end: samples pushed through the ring come out as drained chunks,
/// the session is sealed with every sample, and events carry increasing
/// sequence numbers.
#[test]
fn stop_drains_ring_and_queue_before_exit() {
    let (mut ring_producer, ring_consumer) = create_capture_ring();
    let (chunk_tx, chunk_rx) = create_chunk_queue();

    // 3 full chunks plus a partial tail.
    let total = CHUNK * 3 + 400;
    ring_producer.push_slice(&vec![0.05_f32; total]);

    let recording = Arc::new(AtomicBool::new(true));
    let sealed = Arc::new(AtomicBool::new(false));
    let session = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    let (feedback_tx, mut feedback_rx) = broadcast::channel(64);
    let (metric_tx, _metric_rx) = broadcast::channel(64);
    let (activity_tx, mut activity_rx) = broadcast::channel::<ActivityEvent>(64);
    // Keep a sender alive so try_recv reports Empty, not Closed, after the
    // consumer thread (which owns the moved sender) exits.
    let _activity_keepalive = activity_tx.clone();

    let mut config = AnalysisConfig::default();
    config.silence_threshold = 0.01;
    config.update_interval = 0.0; // every chunk qualifies

    let producer_ctx = pipeline::ProducerContext {
        ring: ring_consumer,
        chunk_tx,
        session: Arc::clone(&session),
        recording: Arc::clone(&recording),
        sealed: Arc::clone(&sealed),
        sample_rate: RATE,
        chunk_samples: CHUNK,
    };
    let consumer_ctx = pipeline::ConsumerContext {
        config,
        extractor: ExtractorHandle::new(CountingExtractor {
            calls: Arc::clone(&calls),
        }),
        emotion: None,
        camera_frame: Arc::new(Mutex::new(None)),
        history: Arc::new(MetricHistory::new(50)),
        recording: Arc::clone(&recording),
        chunk_rx,
        feedback_tx,
        metric_tx,
        activity_tx,
        seq: Arc::new(AtomicU64::new(0)),
        diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
    };

    let producer = thread::spawn(move || pipeline::run_producer(producer_ctx));
    let consumer = thread::spawn(move || pipeline::run_consumer(consumer_ctx));

    // Let the producer pull everything off the ring, then stop.
    thread::sleep(Duration::from_millis(150));
    recording.store(false, Ordering::SeqCst);
    producer.join().expect("producer panicked");
    consumer.join().expect("consumer panicked");

    assert!(sealed.load(Ordering::SeqCst));
    assert_eq!(session.lock().len(), total);

    // 3 full chunks + the flushed partial, all analysed despite the stop.
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let mut last_seq = None;
    for _ in 0..4 {
        let ev = recv_with_timeout(&mut activity_rx, Duration::from_secs(2));
        assert!(!ev.silent);
        if let Some(prev) = last_seq {
            assert!(ev.seq > prev, "activity seq must increase");
        }
        last_seq = Some(ev.seq);
    }
    assert!(matches!(activity_rx.try_recv(), Err(TryRecvError::Empty)));

    let first: FeedbackEvent = recv_with_timeout(&mut feedback_rx, Duration::from_secs(2));
    assert!(first.text.contains("pauses") || first.text.contains("breaks"));
}

/// Chunks under the silence threshold produce a no-analysis notice and never
/// reach the extractor.
#[test]
fn silent_capture_skips_extraction() {
    let (mut ring_producer, ring_consumer) = create_capture_ring();
    let (chunk_tx, chunk_rx) = create_chunk_queue();

    ring_producer.push_slice(&vec![0.001_f32; CHUNK * 2]);

    let recording = Arc::new(AtomicBool::new(true));
    let sealed = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));

    let (feedback_tx, mut feedback_rx) = broadcast::channel(64);
    let (metric_tx, mut metric_rx) = broadcast::channel(64);
    let (activity_tx, _activity_rx) = broadcast::channel::<ActivityEvent>(64);
    // Keep a sender alive so try_recv reports Empty, not Closed, after the
    // consumer thread (which owns the moved sender) exits.
    let _metric_keepalive = metric_tx.clone();

    let mut config = AnalysisConfig::default();
    config.silence_threshold = 0.01;
    config.update_interval = 0.0;

    let producer_ctx = pipeline::ProducerContext {
        ring: ring_consumer,
        chunk_tx,
        session: Arc::new(Mutex::new(Vec::new())),
        recording: Arc::clone(&recording),
        sealed,
        sample_rate: RATE,
        chunk_samples: CHUNK,
    };
    let consumer_ctx = pipeline::ConsumerContext {
        config,
        extractor: ExtractorHandle::new(CountingExtractor {
            calls: Arc::clone(&calls),
        }),
        emotion: None,
        camera_frame: Arc::new(Mutex::new(None)),
        history: Arc::new(MetricHistory::new(50)),
        recording: Arc::clone(&recording),
        chunk_rx,
        feedback_tx,
        metric_tx,
        activity_tx,
        seq: Arc::new(AtomicU64::new(0)),
        diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
    };

    let producer = thread::spawn(move || pipeline::run_producer(producer_ctx));
    let consumer = thread::spawn(move || pipeline::run_consumer(consumer_ctx));

    thread::sleep(Duration::from_millis(150));
    recording.store(false, Ordering::SeqCst);
    producer.join().expect("producer panicked");
    consumer.join().expect("consumer panicked");

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let notice: FeedbackEvent = recv_with_timeout(&mut feedback_rx, Duration::from_secs(2));
    assert!(notice.text.contains("silence threshold"));
    assert!(matches!(metric_rx.try_recv(), Err(TryRecvError::Empty)));
}
