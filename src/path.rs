//! Structured result of a single network path probe
//!
//! A `NetworkPath` is immutable once constructed: the probe engine builds it,
//! the worker serializes it for the forwarder, and it is dropped afterwards.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
    Icmp,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Udp
    }
}

impl Protocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
            Protocol::Icmp => "icmp",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDestination {
    pub hostname: String,
    pub ip_address: String,
    pub port: u16,
}

/// One hop of the traversed path, in TTL order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathHop {
    pub ttl: u8,
    pub ip_address: String,
    pub hostname: String,
    pub rtt_ms: f64,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPath {
    /// Wall-clock milliseconds since the Unix epoch at the start of the run.
    pub timestamp: i64,
    pub protocol: Protocol,
    pub destination: PathDestination,
    pub hops: Vec<PathHop>,
}

impl NetworkPath {
    /// Whether the final hop answered, or `None` when the probe saw no hops.
    pub fn reachable(&self) -> Option<bool> {
        self.hops.last().map(|hop| hop.success)
    }
}
