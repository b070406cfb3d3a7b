//! Rolling per-metric history feeding the display layer.
//!
//! Mutated only by the analysis consumer; read by whoever plots. Readers get
//! a cloned snapshot per metric — display-only use never needs a consistent
//! multi-metric view, so one mutex over the table is enough.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// The four prosody metrics tracked per analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Loudness,
    Pitch,
    SpeechRate,
    Energy,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Loudness,
        Metric::Pitch,
        Metric::SpeechRate,
        Metric::Energy,
    ];

    fn index(self) -> usize {
        match self {
            Metric::Loudness => 0,
            Metric::Pitch => 1,
            Metric::SpeechRate => 2,
            Metric::Energy => 3,
        }
    }

    /// Default display band cut points for this metric.
    pub fn default_bands(self) -> BandThresholds {
        match self {
            Metric::Loudness => BandThresholds::new(-30.0, -26.0),
            Metric::Pitch => BandThresholds::new(1100.0, 1200.0),
            Metric::SpeechRate => BandThresholds::new(20.0, 30.0),
            Metric::Energy => BandThresholds::new(0.004, 0.005),
        }
    }
}

/// Display band for threshold coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Within,
    High,
}

/// Low/high cut points for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandThresholds {
    pub low: f32,
    pub high: f32,
}

impl BandThresholds {
    pub fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    pub fn band(&self, value: f32) -> Band {
        if value < self.low {
            Band::Low
        } else if value > self.high {
            Band::High
        } else {
            Band::Within
        }
    }
}

/// Fixed-capacity FIFO history per metric.
pub struct MetricHistory {
    capacity: usize,
    series: Mutex<[VecDeque<f32>; 4]>,
}

impl MetricHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            series: Mutex::new(std::array::from_fn(|_| {
                VecDeque::with_capacity(capacity)
            })),
        }
    }

    /// Append `value`, evicting the oldest entry beyond capacity.
    pub fn push(&self, metric: Metric, value: f32) {
        let mut table = self.series.lock();
        let deque = &mut table[metric.index()];
        if deque.len() == self.capacity {
            deque.pop_front();
        }
        deque.push_back(value);
    }

    /// Snapshot of the current ordered sequence for `metric`.
    pub fn series(&self, metric: Metric) -> Vec<f32> {
        self.series.lock()[metric.index()].iter().copied().collect()
    }

    pub fn len(&self, metric: Metric) -> usize {
        self.series.lock()[metric.index()].len()
    }

    pub fn is_empty(&self, metric: Metric) -> bool {
        self.len(metric) == 0
    }

    /// Drop all values for all metrics (new recording session).
    pub fn clear(&self) {
        for deque in self.series.lock().iter_mut() {
            deque.clear();
        }
    }
}
