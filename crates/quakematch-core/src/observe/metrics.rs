//! # Engine Counters
//!
//! Lightweight atomic counters and gauges. Recoverable conditions in the
//! engine (gaps, stream resets) are observable only through logs and
//! these counters; nothing is raised.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// A monotonically increasing atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// An atomic gauge that can move in both directions.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters maintained by one detector.
#[derive(Debug, Default)]
pub struct DetectorMetrics {
    /// Records routed into the detector.
    pub records_received: Counter,
    /// Samples appended to stream buffers (post-resampling).
    pub samples_buffered: Counter,
    /// Gap samples synthesized by linear interpolation.
    pub gaps_interpolated: Counter,
    /// Stream state resets (frequency change, out-of-order, gap).
    pub stream_resets: Counter,
    /// Match results emitted by template processors.
    pub matches_emitted: Counter,
    /// Detections published.
    pub detections_emitted: Counter,
    /// Current linker candidate-queue depth.
    pub linker_queue_depth: Gauge,
}

/// Point-in-time copy of the detector counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub samples_buffered: u64,
    pub gaps_interpolated: u64,
    pub stream_resets: u64,
    pub matches_emitted: u64,
    pub detections_emitted: u64,
    pub linker_queue_depth: i64,
}

impl DetectorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.get(),
            samples_buffered: self.samples_buffered.get(),
            gaps_interpolated: self.gaps_interpolated.get(),
            stream_resets: self.stream_resets.get(),
            matches_emitted: self.matches_emitted.get(),
            detections_emitted: self.detections_emitted.get(),
            linker_queue_depth: self.linker_queue_depth.get(),
        }
    }
}
