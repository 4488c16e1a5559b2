//! Short-lived result cache with per-key single-flight.
//!
//! Entries expire lazily on read (and in bulk via `purge_expired`). Concurrent misses on the
//! same key share one computation: the first caller starts it, later callers join it, and the
//! computation keeps running for as long as at least one caller is still waiting on it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::TrendPeriod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Metrics,
    Trends(TrendPeriod),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tenant_id: String,
    pub kind: QueryKind,
}

impl CacheKey {
    pub fn metrics(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            kind: QueryKind::Metrics,
        }
    }

    pub fn trends(tenant_id: &str, period: TrendPeriod) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            kind: QueryKind::Trends(period),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QueryKind::Metrics => write!(f, "metrics:{}", self.tenant_id),
            QueryKind::Trends(period) => write!(f, "trends:{}:{}", self.tenant_id, period),
        }
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }
}

type Flight<V, E> = BoxFuture<'static, Result<V, E>>;

struct Inner<V, E>
where
    V: Clone,
    E: Clone,
{
    entries: DashMap<CacheKey, CacheEntry<V>>,
    in_flight: DashMap<CacheKey, (u64, WeakShared<Flight<V, E>>)>,
    // Bumped by `invalidate_tenant`; a computation only publishes if its tenant's epoch held.
    epochs: DashMap<String, u64>,
    next_flight: AtomicU64,
}

impl<V: Clone, E: Clone> Inner<V, E> {
    fn epoch(&self, tenant_id: &str) -> u64 {
        *self.epochs.entry(tenant_id.to_string()).or_insert(0)
    }
}

/// Cache of computed query results, keyed by tenant and query kind.
pub struct ResultCache<V, E>
where
    V: Clone,
    E: Clone,
{
    inner: Arc<Inner<V, E>>,
}

impl<V: Clone, E: Clone> Clone for ResultCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> Default for ResultCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> ResultCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                epochs: DashMap::new(),
                next_flight: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cached value if it is still within its TTL.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        match self.inner.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        self.inner.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
        None
    }

    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        self.inner.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.inner.entries.remove(key);
    }

    /// Drops every entry for the tenant and detaches its running computations, so the next
    /// call starts a fresh one. Detached computations still answer the callers already
    /// waiting on them but do not populate the cache.
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        *self.inner.epochs.entry(tenant_id.to_string()).or_insert(0) += 1;
        self.inner.entries.retain(|key, _| key.tenant_id != tenant_id);
        self.inner.in_flight.retain(|key, _| key.tenant_id != tenant_id);
    }

    /// Removes expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| entry.is_fresh(now));
        before.saturating_sub(self.inner.entries.len())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Returns the cached value, or runs `compute` and caches its `Ok` result for `ttl`.
    ///
    /// At most one computation per key runs at a time. Callers arriving while one is running
    /// wait for it and receive the same result, `Err` included. Errors are never cached.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.get(&key) {
            tracing::debug!(cache_key = %key, "cache hit");
            return Ok(value);
        }

        let flight = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let running = occupied.get().1.upgrade();
                match running {
                    Some(flight) => {
                        tracing::debug!(cache_key = %key, "joining in-flight computation");
                        flight
                    }
                    None => {
                        // Every earlier waiter went away before it finished.
                        let (id, flight) = self.start_flight(key.clone(), ttl, compute());
                        if let Some(weak) = flight.downgrade() {
                            occupied.insert((id, weak));
                        }
                        flight
                    }
                }
            }
            Entry::Vacant(vacant) => {
                // A flight may have completed between the first lookup and taking the slot.
                if let Some(value) = self.get(&key) {
                    return Ok(value);
                }
                let (id, flight) = self.start_flight(key.clone(), ttl, compute());
                if let Some(weak) = flight.downgrade() {
                    vacant.insert((id, weak));
                }
                flight
            }
        };

        flight.await
    }

    fn start_flight<Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        computation: Fut,
    ) -> (u64, Shared<Flight<V, E>>)
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let epoch = self.inner.epoch(&key.tenant_id);
        let inner = Arc::clone(&self.inner);

        tracing::debug!(cache_key = %key, "cache miss, computing");

        let flight = async move {
            let result = computation.await;

            if let Ok(value) = &result {
                // Holding the epoch shard keeps invalidate_tenant from interleaving with the insert.
                let current = inner.epochs.get(&key.tenant_id);
                if current.as_deref().copied().unwrap_or(0) == epoch {
                    inner.entries.insert(
                        key.clone(),
                        CacheEntry {
                            value: value.clone(),
                            inserted_at: Instant::now(),
                            ttl,
                        },
                    );
                } else {
                    tracing::debug!(cache_key = %key, "tenant invalidated during computation, result not cached");
                }
            }

            inner.in_flight.remove_if(&key, |_, (flight_id, _)| *flight_id == id);
            result
        }
        .boxed()
        .shared();

        (id, flight)
    }
}
