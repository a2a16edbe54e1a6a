pub mod connect;

use crate::path::{NetworkPath, Protocol};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Parameters for a single probe run, built per dispatch by the scheduler.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub dest_hostname: String,
    pub dest_port: u16,
    pub max_ttl: u8,
    pub per_hop_timeout: Duration,
    pub protocol: Protocol,
}

/// A probe engine resolves the destination, performs the probe and returns a
/// fully populated path. Implementations bound their own runtime via
/// `max_ttl` and `per_hop_timeout`.
#[async_trait]
pub trait ProbeEngine: Send + Sync {
    async fn run(&self, config: &ProbeConfig) -> Result<NetworkPath>;

    fn name(&self) -> &str;
}
