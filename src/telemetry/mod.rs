//! Telemetry sink interface and metric names
//!
//! The scheduler pushes gauges through an injected `MetricSink`; wiring a
//! concrete statsd-style client is a deployment concern.

use tracing::debug;

/// Gauge metric names emitted by the scheduler.
pub mod names {
    pub const FLUSH_INTERVAL: &str = "netpath.scheduler.flush_interval";
    pub const FLUSH_DURATION: &str = "netpath.scheduler.flush_duration";
    pub const WORKERS: &str = "netpath.scheduler.workers";
    pub const STORE_SIZE: &str = "netpath.scheduler.pathtest_store_size";
    pub const FLUSHED_COUNT: &str = "netpath.scheduler.pathtest_flushed_count";
    pub const CHECK_DURATION: &str = "netpath.check_duration";
    pub const CHECK_INTERVAL: &str = "netpath.check_interval";
    pub const PATH_MONITORED: &str = "netpath.path.monitored";
    pub const PATH_HOPS: &str = "netpath.path.hops";
    pub const PATH_REACHABLE: &str = "netpath.path.reachable";
    pub const PATH_UNREACHABLE: &str = "netpath.path.unreachable";
}

/// Stateless gauge emitter. Implementations must be safe to call from
/// multiple workers concurrently.
pub trait MetricSink: Send + Sync {
    fn gauge(&self, name: &str, value: f64, tags: &[String], rate: f64);
}

pub struct NoopSink;

impl MetricSink for NoopSink {
    fn gauge(&self, _name: &str, _value: f64, _tags: &[String], _rate: f64) {}
}

/// Sink that logs gauges at DEBUG. Used by the CLI for local runs.
pub struct LogSink;

impl MetricSink for LogSink {
    fn gauge(&self, name: &str, value: f64, tags: &[String], _rate: f64) {
        debug!("gauge {}={} tags={:?}", name, value, tags);
    }
}
