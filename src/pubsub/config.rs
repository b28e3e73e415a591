//! Queue configuration

use crate::pktque::PacketBuf;
use crate::stats::MetricLabels;

/// Queue configuration options
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum GOPs to retain.
    ///
    /// Stored and reported, but retention always drains the buffer on a
    /// video key-frame, so only the current GOP is ever kept.
    pub max_gop_count: usize,

    /// Initial ring buffer slots (grows on demand)
    pub initial_capacity: usize,

    /// Labels for statistics reported by the queue
    pub labels: MetricLabels,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_gop_count: 2,
            initial_capacity: PacketBuf::<()>::DEFAULT_CAPACITY,
            labels: MetricLabels::default(),
        }
    }
}

impl QueueConfig {
    /// Set the maximum GOP count
    pub fn max_gop_count(mut self, n: usize) -> Self {
        self.max_gop_count = n;
        self
    }

    /// Set the initial ring buffer capacity
    pub fn initial_capacity(mut self, slots: usize) -> Self {
        self.initial_capacity = slots;
        self
    }

    /// Set the statistics labels
    pub fn labels(mut self, labels: MetricLabels) -> Self {
        self.labels = labels;
        self
    }
}
