//! Per-dispatch probe execution
//!
//! Runs the probe engine for one pathtest, emits the per-probe gauges and
//! hands the serialized path to the forwarder. Every failure mode here is
//! non-fatal: probe errors suppress the event but keep the `monitored`
//! gauge flowing, serialization and forwarder errors drop the event.

use crate::clock::SharedClock;
use crate::config::SchedulerConfig;
use crate::forwarder::{EventForwarder, EventType};
use crate::host;
use crate::path::NetworkPath;
use crate::probe::{ProbeConfig, ProbeEngine};
use crate::scheduler::store::PathtestContext;
use crate::telemetry::{names, MetricSink};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub(crate) struct ProbeRunner {
    engine: Arc<dyn ProbeEngine>,
    forwarder: Arc<dyn EventForwarder>,
    sink: Arc<dyn MetricSink>,
    clock: SharedClock,
    config: Arc<SchedulerConfig>,
}

impl ProbeRunner {
    pub(crate) fn new(
        engine: Arc<dyn ProbeEngine>,
        forwarder: Arc<dyn EventForwarder>,
        sink: Arc<dyn MetricSink>,
        clock: SharedClock,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            engine,
            forwarder,
            sink,
            clock,
            config,
        }
    }

    pub(crate) async fn run(&self, context: &PathtestContext) {
        let start = self.clock.now();
        let probe_config = ProbeConfig {
            dest_hostname: context.pathtest.hostname.clone(),
            dest_port: context.pathtest.port,
            max_ttl: self.config.max_ttl,
            per_hop_timeout: self.config.per_hop_timeout(),
            protocol: self.config.protocol,
        };

        debug!(
            "Running probe engine={} hostname={} port={}",
            self.engine.name(),
            probe_config.dest_hostname,
            probe_config.dest_port
        );

        let path = match self.engine.run(&probe_config).await {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    "Probe error for {}:{}: {}",
                    context.pathtest.hostname, context.pathtest.port, e
                );
                // A failed probe still counts as monitored.
                let tags = self.telemetry_tags(
                    &context.pathtest.hostname,
                    &context.pathtest.hostname,
                    context.pathtest.port,
                );
                self.sink.gauge(names::PATH_MONITORED, 1.0, &tags, 1.0);
                return;
            }
        };

        self.send_telemetry(&path, start, context);
        self.send_event(&path).await;
    }

    fn send_telemetry(&self, path: &NetworkPath, start: std::time::Instant, context: &PathtestContext) {
        let tags = self.telemetry_tags(
            &path.destination.hostname,
            &path.destination.ip_address,
            path.destination.port,
        );

        let check_duration = self.clock.now().saturating_duration_since(start);
        self.sink.gauge(
            names::CHECK_DURATION,
            check_duration.as_secs_f64(),
            &tags,
            1.0,
        );

        if context.last_flush_interval > Duration::ZERO {
            self.sink.gauge(
                names::CHECK_INTERVAL,
                context.last_flush_interval.as_secs_f64(),
                &tags,
                1.0,
            );
        }

        self.sink.gauge(names::PATH_MONITORED, 1.0, &tags, 1.0);

        if let Some(reachable) = path.reachable() {
            if reachable {
                self.sink
                    .gauge(names::PATH_HOPS, path.hops.len() as f64, &tags, 1.0);
            }
            self.sink.gauge(
                names::PATH_REACHABLE,
                if reachable { 1.0 } else { 0.0 },
                &tags,
                1.0,
            );
            self.sink.gauge(
                names::PATH_UNREACHABLE,
                if reachable { 0.0 } else { 1.0 },
                &tags,
                1.0,
            );
        }
    }

    async fn send_event(&self, path: &NetworkPath) {
        let payload = match serde_json::to_vec(path) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize network path event: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .forwarder
            .send_event_platform_event(Bytes::from(payload), EventType::NetworkPath)
            .await
        {
            error!("Failed to forward network path event: {}", e);
        }
    }

    fn telemetry_tags(
        &self,
        destination_hostname: &str,
        destination_ip: &str,
        destination_port: u16,
    ) -> Vec<String> {
        let mut tags = Vec::with_capacity(7);
        if let Some(agent_host) = host::agent_hostname() {
            tags.push(format!("agent_host:{}", agent_host));
        }
        tags.push(format!("agent_version:{}", crate::VERSION));
        tags.push("pathtest_source:netpath_scheduler".to_string());
        tags.push(format!("protocol:{}", self.config.protocol));
        tags.push(format!("destination_hostname:{}", destination_hostname));
        tags.push(format!("destination_ip:{}", destination_ip));
        let port_tag = if destination_port > 0 {
            destination_port.to_string()
        } else {
            "unspecified".to_string()
        };
        tags.push(format!("destination_port:{}", port_tag));
        tags
    }
}
