//! Network path scheduler
//!
//! Accepts fire-and-forget probe requests from in-process producers, batches
//! and rate-limits them through the pathtest store, runs probes on a bounded
//! worker pool and forwards structured network path events downstream.
//!
//! Background activities: one listener draining the ingress queue into the
//! store, one periodic flush loop dispatching due pathtests to the workers,
//! and `workers` probe runners. All of them terminate on `stop`.

pub mod store;

mod runner;

use crate::clock::{SharedClock, SystemClock};
use crate::config::SchedulerConfig;
use crate::forwarder::EventForwarder;
use crate::probe::ProbeEngine;
use crate::scheduler::runner::ProbeRunner;
use crate::scheduler::store::{Pathtest, PathtestContext, PathtestStore};
use crate::telemetry::{names, MetricSink};
use crate::{NetpathError, Result};
use futures::FutureExt;
use ipnet::IpNet;
use std::any::Any;
use std::net::{IpAddr, Ipv4Addr};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Result of a `schedule` call that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The request was admitted to the ingress queue.
    Accepted,
    /// The target is not probeable (non-IPv4 or excluded); nothing was
    /// admitted. Not an error.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Started,
    Stopped,
}

pub struct NetworkPathScheduler {
    config: Arc<SchedulerConfig>,
    store: Arc<PathtestStore>,
    runner: Arc<ProbeRunner>,
    sink: Arc<dyn MetricSink>,
    clock: SharedClock,
    exclude_nets: Vec<IpNet>,

    input_tx: mpsc::Sender<Pathtest>,
    input_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Pathtest>>>,
    process_tx: mpsc::Sender<PathtestContext>,
    process_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PathtestContext>>>,

    cancel: CancellationToken,
    state: Mutex<State>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    received_count: AtomicU64,
}

impl NetworkPathScheduler {
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<dyn ProbeEngine>,
        forwarder: Arc<dyn EventForwarder>,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self> {
        Self::with_clock(config, engine, forwarder, sink, Arc::new(SystemClock))
    }

    /// Like `new` but with an injected clock, so tests can control time.
    pub fn with_clock(
        config: SchedulerConfig,
        engine: Arc<dyn ProbeEngine>,
        forwarder: Arc<dyn EventForwarder>,
        sink: Arc<dyn MetricSink>,
        clock: SharedClock,
    ) -> Result<Self> {
        let exclude_nets = config.exclude_nets()?;
        let config = Arc::new(config);

        info!(
            "New network path scheduler (workers={} ingress_capacity={} run_interval={:?} run_duration_from_discovery={:?} exclude_cidr={:?})",
            config.workers,
            config.ingress_capacity,
            config.run_interval(),
            config.run_duration_from_discovery(),
            config.exclude_cidr
        );

        let (input_tx, input_rx) = mpsc::channel(config.ingress_capacity.max(1));
        let (process_tx, process_rx) = mpsc::channel(config.process_capacity.max(1));

        let store = Arc::new(PathtestStore::new(
            config.run_interval(),
            config.run_duration_from_discovery(),
            clock.clone(),
        ));
        let runner = Arc::new(ProbeRunner::new(
            engine,
            forwarder,
            sink.clone(),
            clock.clone(),
            config.clone(),
        ));

        Ok(Self {
            config,
            store,
            runner,
            sink,
            clock,
            exclude_nets,
            input_tx,
            input_rx: Arc::new(tokio::sync::Mutex::new(input_rx)),
            process_tx,
            process_rx: Arc::new(tokio::sync::Mutex::new(process_rx)),
            cancel: CancellationToken::new(),
            state: Mutex::new(State::New),
            handles: Mutex::new(Vec::new()),
            received_count: AtomicU64::new(0),
        })
    }

    /// Request a probe of `hostname:port`. Never blocks: the request is
    /// either admitted to the ingress queue, ignored (non-IPv4 or excluded
    /// target), or rejected with `QueueFull` when the queue is at capacity.
    pub fn schedule(&self, hostname: &str, port: u16) -> Result<ScheduleOutcome> {
        debug!("Schedule pathtest for: hostname={} port={}", hostname, port);

        let Ok(address) = hostname.parse::<Ipv4Addr>() else {
            debug!(
                "Only IPv4 is currently supported. Address not supported: {}",
                hostname
            );
            return Ok(ScheduleOutcome::Ignored);
        };

        if self
            .exclude_nets
            .iter()
            .any(|net| net.contains(&IpAddr::V4(address)))
        {
            debug!("Excluded address: {}", hostname);
            return Ok(ScheduleOutcome::Ignored);
        }

        let pathtest = Pathtest {
            hostname: hostname.to_string(),
            port,
        };
        match self.input_tx.try_send(pathtest) {
            Ok(()) => Ok(ScheduleOutcome::Accepted),
            // The receiver lives as long as the scheduler, so the only send
            // failure is a full queue.
            Err(_) => Err(NetpathError::QueueFull {
                capacity: self.config.ingress_capacity,
            }),
        }
    }

    /// Spawn the background activities. Only the first call has any effect.
    pub fn start(self: &Arc<Self>) {
        let mut state = self.state.lock().unwrap();
        if *state != State::New {
            info!("Scheduler already started or stopped, ignoring start request");
            return;
        }
        *state = State::Started;
        drop(state);

        info!("Starting network path scheduler");

        let mut handles = self.handles.lock().unwrap();
        handles.push(tokio::spawn(self.clone().listen()));
        handles.push(tokio::spawn(self.clone().flush_loop()));
        for worker_id in 0..self.config.workers.max(1) {
            handles.push(tokio::spawn(self.clone().worker(worker_id)));
        }
    }

    /// Signal the background activities to terminate and wait for each of
    /// them, including workers finishing an in-flight probe. After `stop`
    /// returns no further telemetry or forwarder emission occurs.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != State::Started {
                return;
            }
            *state = State::Stopped;
        }

        info!("Stopping network path scheduler");
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Background task failed during shutdown: {}", e);
            }
        }

        info!("Network path scheduler stopped");
    }

    /// Number of requests admitted by the ingress listener so far.
    pub fn received_count(&self) -> u64 {
        self.received_count.load(Ordering::Relaxed)
    }

    /// Number of pathtests currently held by the store.
    pub async fn pending_count(&self) -> usize {
        self.store.count().await
    }

    async fn listen(self: Arc<Self>) {
        let mut input_rx = self.input_rx.lock().await;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Stopped listening for pathtest requests");
                    return;
                }
                received = input_rx.recv() => {
                    let Some(pathtest) = received else { return };
                    debug!(
                        "Pathtest received: {}:{}",
                        pathtest.hostname, pathtest.port
                    );
                    self.received_count.fetch_add(1, Ordering::Relaxed);
                    self.store.add(pathtest).await;
                }
            }
        }
    }

    async fn flush_loop(self: Arc<Self>) {
        let period = self.config.flush_interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_flush: Option<Instant> = None;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Stopped flush loop");
                    return;
                }
                _ = ticker.tick() => {
                    let now = self.clock.now();
                    if let Some(last) = last_flush {
                        self.sink.gauge(
                            names::FLUSH_INTERVAL,
                            now.saturating_duration_since(last).as_secs_f64(),
                            &[],
                            1.0,
                        );
                    }
                    last_flush = Some(now);

                    let flush_start = self.clock.now();
                    if let Err(payload) = AssertUnwindSafe(self.flush()).catch_unwind().await {
                        error!("Flush panicked: {}", panic_message(payload));
                    }
                    self.sink.gauge(
                        names::FLUSH_DURATION,
                        self.clock.now().saturating_duration_since(flush_start).as_secs_f64(),
                        &[],
                        1.0,
                    );
                }
            }
        }
    }

    async fn flush(&self) {
        self.sink
            .gauge(names::WORKERS, self.config.workers as f64, &[], 1.0);

        let store_size = self.store.count().await;
        self.sink
            .gauge(names::STORE_SIZE, store_size as f64, &[], 1.0);

        let due = self.store.flush().await;
        self.sink
            .gauge(names::FLUSHED_COUNT, due.len() as f64, &[], 1.0);
        debug!(
            "Flushing {} pathtests to the workers (store_size_before_flush={})",
            due.len(),
            store_size
        );

        for context in due {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                sent = self.process_tx.send(context) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn worker(self: Arc<Self>, worker_id: usize) {
        debug!("Starting worker #{}", worker_id);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("[worker{}] Stopping worker", worker_id);
                    return;
                }
                received = Self::next_dispatch(&self.process_rx) => {
                    let Some(context) = received else { return };
                    debug!(
                        "[worker{}] Handling pathtest hostname={} port={}",
                        worker_id, context.pathtest.hostname, context.pathtest.port
                    );
                    if let Err(payload) =
                        AssertUnwindSafe(self.runner.run(&context)).catch_unwind().await
                    {
                        error!(
                            "[worker{}] Probe run panicked: {}",
                            worker_id,
                            panic_message(payload)
                        );
                    }
                }
            }
        }
    }

    async fn next_dispatch(
        process_rx: &Arc<tokio::sync::Mutex<mpsc::Receiver<PathtestContext>>>,
    ) -> Option<PathtestContext> {
        process_rx.lock().await.recv().await
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::{EventForwarder, EventType};
    use crate::path::NetworkPath;
    use crate::probe::{ProbeConfig, ProbeEngine};
    use crate::telemetry::NoopSink;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct FailingEngine;

    #[async_trait]
    impl ProbeEngine for FailingEngine {
        async fn run(&self, _config: &ProbeConfig) -> Result<NetworkPath> {
            Err(NetpathError::Probe("unreachable".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct NoopForwarder;

    #[async_trait]
    impl EventForwarder for NoopForwarder {
        async fn send_event_platform_event(
            &self,
            _payload: Bytes,
            _event_type: EventType,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn scheduler_with_config(config: SchedulerConfig) -> NetworkPathScheduler {
        NetworkPathScheduler::new(
            config,
            Arc::new(FailingEngine),
            Arc::new(NoopForwarder),
            Arc::new(NoopSink),
        )
        .expect("Should build scheduler")
    }

    #[tokio::test]
    async fn test_schedule_ignores_non_ipv4() {
        let scheduler = scheduler_with_config(SchedulerConfig::default());

        let outcome = scheduler
            .schedule("2001:db8::1", 80)
            .expect("Should not error");

        assert_eq!(outcome, ScheduleOutcome::Ignored);
        assert_eq!(scheduler.pending_count().await, 0);

        let outcome = scheduler
            .schedule("not-an-address", 80)
            .expect("Should not error");
        assert_eq!(outcome, ScheduleOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_schedule_rejects_when_queue_full() {
        let config = SchedulerConfig {
            ingress_capacity: 2,
            ..Default::default()
        };
        // Not started: nothing drains the queue.
        let scheduler = scheduler_with_config(config);

        scheduler.schedule("10.0.0.1", 80).expect("Should accept");
        scheduler.schedule("10.0.0.2", 80).expect("Should accept");
        let rejected = scheduler.schedule("10.0.0.3", 80);

        match rejected {
            Err(NetpathError::QueueFull { capacity }) => assert_eq!(capacity, 2),
            other => panic!("Expected QueueFull, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schedule_ignores_excluded_cidr() {
        let config = SchedulerConfig {
            exclude_cidr: vec!["10.0.0.0/8".to_string()],
            ..Default::default()
        };
        let scheduler = scheduler_with_config(config);

        let outcome = scheduler
            .schedule("10.1.2.3", 80)
            .expect("Should not error");
        assert_eq!(outcome, ScheduleOutcome::Ignored);

        let outcome = scheduler
            .schedule("192.168.0.1", 80)
            .expect("Should not error");
        assert_eq!(outcome, ScheduleOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_invalid_exclude_cidr_is_a_config_error() {
        let config = SchedulerConfig {
            exclude_cidr: vec!["bogus".to_string()],
            ..Default::default()
        };

        let result = NetworkPathScheduler::new(
            config,
            Arc::new(FailingEngine),
            Arc::new(NoopForwarder),
            Arc::new(NoopSink),
        );

        assert!(matches!(result, Err(NetpathError::Config(_))));
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_twice_is_safe() {
        let scheduler = Arc::new(scheduler_with_config(SchedulerConfig::default()));

        scheduler.start();
        scheduler.start();
        scheduler.stop().await;
        scheduler.stop().await;
    }
}
