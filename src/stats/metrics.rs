//! Reporting port for queue statistics
//!
//! The queue never owns global metric state. A [`MetricsSink`] is built
//! once by the embedding server and handed to every queue it creates; when
//! nothing is injected the queue reports into [`NoopMetrics`].

use std::collections::HashMap;

use parking_lot::Mutex;

/// Video frames written
pub const FRAMES: &str = "frames";
/// Video payload bits written
pub const BITS: &str = "bits";
/// Payload bits written across all streams
pub const TOTAL_BITS: &str = "totalbits";
/// Video key-frames written
pub const KEYFRAME: &str = "keyframe";
/// Video sequence headers written
pub const VIDEO_SEQ_HEADER: &str = "vseqhdr";
/// Audio sequence headers written
pub const AUDIO_SEQ_HEADER: &str = "aseqhdr";
/// Timestamp of the first key-frame in milliseconds
pub const FIRST_KEYFRAME: &str = "firstkeyframe";
/// Milliseconds between the first packet and the first key-frame
pub const WAIT_FIRST_KEYFRAME: &str = "waitfirstkeyframe";
/// Milliseconds between a packet's arrival and its delivery to a reader
pub const FRAME_LATENCY: &str = "framelatency";

/// Labels attached to every reported value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricLabels {
    /// Identity of the producer (e.g. the stream key)
    pub who: String,
    /// Operation being measured (e.g. "publish", "subscribe")
    pub op: String,
}

impl MetricLabels {
    pub fn new(who: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            who: who.into(),
            op: op.into(),
        }
    }

    /// Same producer, different operation
    pub fn with_op(&self, op: impl Into<String>) -> Self {
        Self {
            who: self.who.clone(),
            op: op.into(),
        }
    }
}

impl Default for MetricLabels {
    fn default() -> Self {
        Self::new("queue", "publish")
    }
}

impl std::fmt::Display for MetricLabels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.who, self.op)
    }
}

/// Counter and gauge sink
///
/// Every method has a no-op default, so implementations only override
/// what they record.
pub trait MetricsSink: Send + Sync {
    /// Add `delta` to a counter
    fn add_counter(&self, _name: &str, _labels: &MetricLabels, _delta: u64) {}

    /// Add one to a counter
    fn increment_counter(&self, name: &str, labels: &MetricLabels) {
        self.add_counter(name, labels, 1);
    }

    /// Set a gauge
    fn set_gauge(&self, _name: &str, _labels: &MetricLabels, _value: f64) {}

    /// Forget every series carrying these labels
    fn clear(&self, _labels: &MetricLabels) {}
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// In-memory sink, readable back for tests and status pages
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    counters: Mutex<HashMap<(String, MetricLabels), u64>>,
    gauges: Mutex<HashMap<(String, MetricLabels), f64>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value, zero if never incremented
    pub fn counter(&self, name: &str, labels: &MetricLabels) -> u64 {
        self.counters
            .lock()
            .get(&(name.to_string(), labels.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Current gauge value
    pub fn gauge(&self, name: &str, labels: &MetricLabels) -> Option<f64> {
        self.gauges
            .lock()
            .get(&(name.to_string(), labels.clone()))
            .copied()
    }

    /// Number of recorded series
    pub fn series_count(&self) -> usize {
        self.counters.lock().len() + self.gauges.lock().len()
    }
}

impl MetricsSink for MemoryMetrics {
    fn add_counter(&self, name: &str, labels: &MetricLabels, delta: u64) {
        *self
            .counters
            .lock()
            .entry((name.to_string(), labels.clone()))
            .or_insert(0) += delta;
    }

    fn set_gauge(&self, name: &str, labels: &MetricLabels, value: f64) {
        self.gauges
            .lock()
            .insert((name.to_string(), labels.clone()), value);
    }

    fn clear(&self, labels: &MetricLabels) {
        self.counters.lock().retain(|(_, l), _| l != labels);
        self.gauges.lock().retain(|(_, l), _| l != labels);
    }
}
