//! Scheduler configuration
//!
//! Loaded from a YAML file by the CLI; every field has a default so a partial
//! file (or none at all) yields a working scheduler.

use crate::path::Protocol;
use crate::{NetpathError, Result};
use ipnet::IpNet;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_WORKERS: usize = 3;
const DEFAULT_INGRESS_CAPACITY: usize = 1000;
const DEFAULT_PROCESS_CAPACITY: usize = 1000;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10_000;
const DEFAULT_RUN_INTERVAL_SECS: u64 = 300;
const DEFAULT_RUN_DURATION_FROM_DISCOVERY_SECS: u64 = 900;
const DEFAULT_MAX_TTL: u8 = 24;
const DEFAULT_PER_HOP_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrent probes.
    pub workers: usize,
    /// Capacity of the ingress queue fed by `schedule`.
    pub ingress_capacity: usize,
    /// Capacity of the dispatch channel between the flush loop and workers.
    pub process_capacity: usize,
    /// Period of the flush loop.
    pub flush_interval_ms: u64,
    /// Minimum gap between re-dispatches of the same pathtest.
    pub run_interval_secs: u64,
    /// TTL extension granted to a pathtest on admission or refresh.
    pub run_duration_from_discovery_secs: u64,
    pub max_ttl: u8,
    pub per_hop_timeout_ms: u64,
    pub protocol: Protocol,
    /// CIDR blocks whose addresses are ignored at ingress.
    pub exclude_cidr: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            process_capacity: DEFAULT_PROCESS_CAPACITY,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            run_interval_secs: DEFAULT_RUN_INTERVAL_SECS,
            run_duration_from_discovery_secs: DEFAULT_RUN_DURATION_FROM_DISCOVERY_SECS,
            max_ttl: DEFAULT_MAX_TTL,
            per_hop_timeout_ms: DEFAULT_PER_HOP_TIMEOUT_MS,
            protocol: Protocol::Udp,
            exclude_cidr: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }

    pub fn run_duration_from_discovery(&self) -> Duration {
        Duration::from_secs(self.run_duration_from_discovery_secs)
    }

    pub fn per_hop_timeout(&self) -> Duration {
        Duration::from_millis(self.per_hop_timeout_ms)
    }

    /// Parse `exclude_cidr` into networks, rejecting malformed entries.
    pub fn exclude_nets(&self) -> Result<Vec<IpNet>> {
        self.exclude_cidr
            .iter()
            .map(|cidr| {
                cidr.parse::<IpNet>().map_err(|e| {
                    NetpathError::Config(format!("invalid exclude_cidr entry {:?}: {}", cidr, e))
                })
            })
            .collect()
    }
}

/// A probe target submitted by the CLI `run` command.
#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    pub hostname: String,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub targets: Vec<Target>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)?;
    serde_yaml::from_str(&raw)
        .map_err(|e| NetpathError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();

        assert_eq!(config.workers, 3);
        assert_eq!(config.ingress_capacity, 1000);
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert_eq!(config.run_interval(), Duration::from_secs(300));
        assert_eq!(config.max_ttl, 24);
        assert_eq!(config.per_hop_timeout(), Duration::from_millis(1000));
        assert_eq!(config.protocol, Protocol::Udp);
        assert!(config.exclude_cidr.is_empty());
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().expect("Should create temp file");
        write!(
            file,
            "scheduler:\n  workers: 5\n  flush_interval_ms: 2000\ntargets:\n  - hostname: 10.0.0.1\n    port: 443\n"
        )
        .expect("Should write config");

        let config = load_config(file.path()).expect("Should load config");

        assert_eq!(config.scheduler.workers, 5);
        assert_eq!(config.scheduler.flush_interval(), Duration::from_secs(2));
        // untouched fields keep their defaults
        assert_eq!(config.scheduler.ingress_capacity, 1000);
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].hostname, "10.0.0.1");
        assert_eq!(config.targets[0].port, 443);
    }

    #[test]
    fn test_exclude_nets_rejects_malformed_cidr() {
        let config = SchedulerConfig {
            exclude_cidr: vec!["10.0.0.0/8".to_string(), "not-a-cidr".to_string()],
            ..Default::default()
        };

        let result = config.exclude_nets();

        assert!(matches!(result, Err(NetpathError::Config(_))));
    }

    #[test]
    fn test_exclude_nets_parses_valid_cidr() {
        let config = SchedulerConfig {
            exclude_cidr: vec!["10.0.0.0/8".to_string(), "192.168.0.0/16".to_string()],
            ..Default::default()
        };

        let nets = config.exclude_nets().expect("Should parse");

        assert_eq!(nets.len(), 2);
    }
}
