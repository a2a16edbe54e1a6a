//! In-memory registry of probe targets awaiting dispatch
//!
//! De-duplicates requests by `(hostname, port)`, tracks per-target
//! scheduling metadata and evicts targets whose TTL lapsed without a fresh
//! request. Mutated by the ingress listener (`add`) and the flush loop
//! (`flush`, `count`); all access is serialized on an internal lock.

use crate::clock::SharedClock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Identity of a probe target.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Pathtest {
    pub hostname: String,
    pub port: u16,
}

/// A stored pathtest plus its scheduling metadata.
#[derive(Debug, Clone)]
pub struct PathtestContext {
    pub pathtest: Pathtest,
    /// First admission of this pathtest.
    pub first_seen: Instant,
    /// Most recent dispatch, unset until the first one.
    pub last_scheduled: Option<Instant>,
    /// Gap between the two most recent dispatches, zero on the first.
    pub last_flush_interval: Duration,
    /// `first_seen` plus the run duration; never refreshed.
    pub discovered_until: Instant,
    /// Eviction deadline, pushed forward on every re-admission.
    pub expires_at: Instant,
    seq: u64,
}

struct StoreInner {
    contexts: HashMap<Pathtest, PathtestContext>,
    next_seq: u64,
}

pub struct PathtestStore {
    inner: RwLock<StoreInner>,
    run_interval: Duration,
    run_duration_from_discovery: Duration,
    clock: SharedClock,
}

impl PathtestStore {
    pub fn new(
        run_interval: Duration,
        run_duration_from_discovery: Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                contexts: HashMap::new(),
                next_seq: 0,
            }),
            run_interval,
            run_duration_from_discovery,
            clock,
        }
    }

    /// Admit a pathtest. A pathtest already present is refreshed: its
    /// eviction deadline moves to `now + run_duration_from_discovery`.
    pub async fn add(&self, pathtest: Pathtest) {
        let now = self.clock.now();
        let expires_at = now + self.run_duration_from_discovery;

        let mut inner = self.inner.write().await;
        if let Some(context) = inner.contexts.get_mut(&pathtest) {
            debug!(
                "Refreshing pathtest {}:{}",
                pathtest.hostname, pathtest.port
            );
            context.expires_at = expires_at;
            return;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.contexts.insert(
            pathtest.clone(),
            PathtestContext {
                pathtest,
                first_seen: now,
                last_scheduled: None,
                last_flush_interval: Duration::ZERO,
                discovered_until: expires_at,
                expires_at,
                seq,
            },
        );
    }

    /// Evict expired entries, then select and return the entries due for a
    /// run. Selected entries have `last_scheduled` bumped to now and
    /// `last_flush_interval` set to the gap since their previous dispatch.
    /// The returned list is in admission order so the oldest target is never
    /// shadowed within a tick.
    pub async fn flush(&self) -> Vec<PathtestContext> {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;

        inner.contexts.retain(|pathtest, context| {
            if now > context.expires_at {
                debug!(
                    "Expiring pathtest {}:{}",
                    pathtest.hostname, pathtest.port
                );
                false
            } else {
                true
            }
        });

        let mut due: Vec<PathtestContext> = Vec::new();
        for context in inner.contexts.values_mut() {
            let is_due = match context.last_scheduled {
                None => true,
                Some(last) => now.saturating_duration_since(last) >= self.run_interval,
            };
            if is_due {
                context.last_flush_interval = context
                    .last_scheduled
                    .map(|last| now.saturating_duration_since(last))
                    .unwrap_or(Duration::ZERO);
                context.last_scheduled = Some(now);
                due.push(context.clone());
            }
        }
        due.sort_by_key(|context| context.seq);
        due
    }

    /// Number of stored entries.
    pub async fn count(&self) -> usize {
        self.inner.read().await.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn pathtest(hostname: &str, port: u16) -> Pathtest {
        Pathtest {
            hostname: hostname.to_string(),
            port,
        }
    }

    fn store_with_clock(
        run_interval: Duration,
        ttl: Duration,
    ) -> (PathtestStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = PathtestStore::new(run_interval, ttl, clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_add_deduplicates() {
        let (store, _clock) =
            store_with_clock(Duration::from_secs(60), Duration::from_secs(900));

        store.add(pathtest("10.0.0.1", 80)).await;
        store.add(pathtest("10.0.0.1", 80)).await;
        store.add(pathtest("10.0.0.1", 443)).await;

        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_first_flush_dispatches_with_zero_interval() {
        let (store, _clock) =
            store_with_clock(Duration::from_secs(60), Duration::from_secs(900));

        store.add(pathtest("10.0.0.1", 80)).await;
        let due = store.flush().await;

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].pathtest, pathtest("10.0.0.1", 80));
        assert_eq!(due[0].last_flush_interval, Duration::ZERO);
        assert!(due[0].last_scheduled.is_some());
    }

    #[tokio::test]
    async fn test_flush_respects_run_interval() {
        let (store, clock) =
            store_with_clock(Duration::from_secs(60), Duration::from_secs(900));

        store.add(pathtest("10.0.0.1", 80)).await;
        assert_eq!(store.flush().await.len(), 1);

        clock.advance(Duration::from_secs(30));
        assert!(store.flush().await.is_empty());

        clock.advance(Duration::from_secs(30));
        let due = store.flush().await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].last_flush_interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_flush_evicts_expired_without_dispatch() {
        let (store, clock) =
            store_with_clock(Duration::from_secs(60), Duration::from_secs(900));

        store.add(pathtest("10.0.0.1", 80)).await;
        clock.advance(Duration::from_secs(901));

        assert!(store.flush().await.is_empty());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_refresh_extends_expiry() {
        let (store, clock) =
            store_with_clock(Duration::from_secs(60), Duration::from_secs(900));

        store.add(pathtest("10.0.0.1", 80)).await;
        clock.advance(Duration::from_secs(600));
        store.add(pathtest("10.0.0.1", 80)).await;
        clock.advance(Duration::from_secs(600));

        // 1200s after first admission but only 600s after the refresh
        let due = store.flush().await;
        assert_eq!(due.len(), 1);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_flush_returns_admission_order() {
        let (store, _clock) =
            store_with_clock(Duration::from_secs(60), Duration::from_secs(900));

        store.add(pathtest("10.0.0.3", 80)).await;
        store.add(pathtest("10.0.0.1", 80)).await;
        store.add(pathtest("10.0.0.2", 80)).await;

        let due = store.flush().await;
        let hostnames: Vec<&str> = due.iter().map(|c| c.pathtest.hostname.as_str()).collect();

        assert_eq!(hostnames, vec!["10.0.0.3", "10.0.0.1", "10.0.0.2"]);
    }

    #[tokio::test]
    async fn test_discovered_until_is_not_refreshed() {
        let (store, clock) =
            store_with_clock(Duration::from_secs(60), Duration::from_secs(900));

        store.add(pathtest("10.0.0.1", 80)).await;
        let first = store.flush().await;
        let discovered_until = first[0].discovered_until;

        clock.advance(Duration::from_secs(300));
        store.add(pathtest("10.0.0.1", 80)).await;

        clock.advance(Duration::from_secs(60));
        let due = store.flush().await;
        assert_eq!(due[0].discovered_until, discovered_until);
        assert!(due[0].expires_at > discovered_until);
    }
}
