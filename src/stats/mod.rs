//! Statistics reporting for queues and cursors

pub mod metrics;

pub use metrics::{MemoryMetrics, MetricLabels, MetricsSink, NoopMetrics};
