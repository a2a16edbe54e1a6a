//! Minimal built-in probe engine based on TCP connect
//!
//! Reports the destination as a single hop: reachable when a connection is
//! established within the per-hop timeout. It does not walk intermediate
//! hops; deployments wanting hop-by-hop paths plug in their own engine.

use crate::clock::{Clock, SystemClock};
use crate::path::{NetworkPath, PathDestination, PathHop};
use crate::probe::{ProbeConfig, ProbeEngine};
use crate::{NetpathError, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub struct TcpConnectEngine {
    clock: SystemClock,
}

impl TcpConnectEngine {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }

    async fn resolve(&self, hostname: &str, port: u16) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((hostname, port))
            .await
            .map_err(|e| NetpathError::Probe(format!("failed to resolve {}: {}", hostname, e)))?;

        addrs
            .next()
            .ok_or_else(|| NetpathError::Probe(format!("no address found for {}", hostname)))
    }
}

impl Default for TcpConnectEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeEngine for TcpConnectEngine {
    async fn run(&self, config: &ProbeConfig) -> Result<NetworkPath> {
        if config.dest_port == 0 {
            return Err(NetpathError::Probe(
                "tcp connect probe requires a destination port".to_string(),
            ));
        }

        let addr = self.resolve(&config.dest_hostname, config.dest_port).await?;
        let timestamp = self.clock.unix_millis();

        let start = Instant::now();
        let connected = matches!(
            timeout(config.per_hop_timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        );
        let rtt = start.elapsed();

        debug!(
            "tcp connect probe {}:{} connected={} rtt={:?}",
            config.dest_hostname, config.dest_port, connected, rtt
        );

        Ok(NetworkPath {
            timestamp,
            protocol: config.protocol,
            destination: PathDestination {
                hostname: config.dest_hostname.clone(),
                ip_address: addr.ip().to_string(),
                port: config.dest_port,
            },
            hops: vec![PathHop {
                ttl: 1,
                ip_address: addr.ip().to_string(),
                hostname: config.dest_hostname.clone(),
                rtt_ms: rtt.as_secs_f64() * 1000.0,
                success: connected,
            }],
        })
    }

    fn name(&self) -> &str {
        "tcp-connect"
    }
}
