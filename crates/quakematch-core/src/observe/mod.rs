//! Observability: structured logging setup and engine counters.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use metrics::{Counter, DetectorMetrics, Gauge, MetricsSnapshot};
