//! Event forwarder interface
//!
//! The scheduler hands serialized network path events to a forwarder; the
//! wire format and delivery guarantees are the forwarder's concern.

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    NetworkPath,
}

impl EventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::NetworkPath => "network-path",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[async_trait]
pub trait EventForwarder: Send + Sync {
    /// Hand one serialized event to the forwarder. Expected to fail fast;
    /// the scheduler does not retry.
    async fn send_event_platform_event(&self, payload: Bytes, event_type: EventType) -> Result<()>;
}

/// Forwarder that logs events instead of shipping them. Used by the CLI for
/// local runs.
pub struct LogForwarder;

#[async_trait]
impl EventForwarder for LogForwarder {
    async fn send_event_platform_event(&self, payload: Bytes, event_type: EventType) -> Result<()> {
        info!(
            "event type={} payload={}",
            event_type,
            String::from_utf8_lossy(&payload)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_label() {
        assert_eq!(EventType::NetworkPath.as_str(), "network-path");
        assert_eq!(EventType::NetworkPath.to_string(), "network-path");
    }
}
