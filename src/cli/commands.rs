use crate::cli::Commands;
use crate::config::{self, Config};
use crate::forwarder::LogForwarder;
use crate::probe::connect::TcpConnectEngine;
use crate::probe::{ProbeConfig, ProbeEngine};
use crate::scheduler::{NetworkPathScheduler, ScheduleOutcome};
use crate::telemetry::LogSink;
use crate::{NetpathError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run { config } => handle_run(config).await,
        Commands::Probe {
            hostname,
            port,
            timeout_ms,
        } => handle_probe(hostname, port, timeout_ms).await,
    }
}

async fn handle_run(config_path: Option<String>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::load_config(Path::new(&path))?,
        None => Config::default(),
    };
    if config.targets.is_empty() {
        return Err(NetpathError::Config(
            "no targets configured; add a `targets` list to the config file".to_string(),
        ));
    }

    // Targets age out of the store unless renewed, so re-submit them well
    // before run_duration_from_discovery lapses.
    let readmit_interval =
        Duration::from_secs((config.scheduler.run_duration_from_discovery_secs / 2).max(30));

    let scheduler = Arc::new(NetworkPathScheduler::new(
        config.scheduler,
        Arc::new(TcpConnectEngine::new()),
        Arc::new(LogForwarder),
        Arc::new(LogSink),
    )?);
    scheduler.start();

    schedule_targets(&scheduler, &config.targets);

    let mut readmit_ticker = tokio::time::interval(readmit_interval);
    readmit_ticker.tick().await;

    info!("Scheduler running with {} targets. Press Ctrl+C to exit.", config.targets.len());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = readmit_ticker.tick() => {
                schedule_targets(&scheduler, &config.targets);
            }
        }
    }

    scheduler.stop().await;
    Ok(())
}

fn schedule_targets(scheduler: &NetworkPathScheduler, targets: &[config::Target]) {
    for target in targets {
        match scheduler.schedule(&target.hostname, target.port) {
            Ok(ScheduleOutcome::Accepted) => {}
            Ok(ScheduleOutcome::Ignored) => {
                warn!("Target {}:{} was ignored", target.hostname, target.port);
            }
            Err(e) => {
                warn!(
                    "Failed to schedule {}:{}: {}",
                    target.hostname, target.port, e
                );
            }
        }
    }
}

async fn handle_probe(hostname: String, port: u16, timeout_ms: u64) -> Result<()> {
    let engine = TcpConnectEngine::new();
    let probe_config = ProbeConfig {
        dest_hostname: hostname,
        dest_port: port,
        max_ttl: 24,
        per_hop_timeout: Duration::from_millis(timeout_ms),
        protocol: crate::path::Protocol::Tcp,
    };

    let path = engine.run(&probe_config).await?;
    println!("{}", serde_json::to_string_pretty(&path)?);
    Ok(())
}
