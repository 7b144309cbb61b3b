//! # orderhub-cache
//!
//! Bounded, time-expiring cache keyed by order UID.
//!
//! The cache is shared between the ingestion pipeline (writer) and the HTTP
//! read path (reader); all access goes through a read/write lock around the
//! backing map, so no caller observes a half-updated entry. Capacity is
//! enforced per insert by evicting the entry with the oldest timestamp;
//! expiry is enforced lazily on reads and proactively by a background
//! sweeper that runs once per [`SWEEP_INTERVAL`] for the lifetime of the
//! cache.
//!
//! The sweeper task holds only a weak reference to the cache, so dropping
//! the last [`Arc<OrderCache>`] (or calling [`OrderCache::shutdown`]) stops
//! it rather than leaking a periodic timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use orderhub_core::Order;

/// How often the background sweeper removes expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry {
    order: Arc<Order>,
    created_at: Instant,
}

/// Bounded TTL cache for orders, safe for concurrent readers and writers.
pub struct OrderCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl OrderCache {
    /// Creates a cache and starts its background sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(ttl: Duration, capacity: usize) -> Arc<Self> {
        Self::with_sweep_interval(ttl, capacity, SWEEP_INTERVAL)
    }

    /// Creates a cache with a custom sweep interval.
    pub fn with_sweep_interval(ttl: Duration, capacity: usize, interval: Duration) -> Arc<Self> {
        let cache = Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity,
            sweeper: Mutex::new(None),
        });

        let weak = Arc::downgrade(&cache);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a fresh cache is
            // not swept before anything is inserted.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else { break };
                cache.sweep();
            }
        });
        *cache.sweeper.lock().expect("sweeper lock poisoned") = Some(handle);

        cache
    }

    /// Looks up an order by UID.
    ///
    /// Returns `None` when the key is absent or the entry's age exceeds the
    /// TTL. An expired entry is treated as a miss but left in place; the
    /// sweeper removes it on its next pass.
    pub fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        let entries = self.entries.read().expect("cache lock poisoned");
        entries
            .get(order_uid)
            .filter(|entry| entry.created_at.elapsed() <= self.ttl)
            .map(|entry| Arc::clone(&entry.order))
    }

    /// Inserts or replaces the entry for `order_uid` with a fresh timestamp.
    ///
    /// When the insert would grow the cache past capacity, the entry with
    /// the oldest timestamp is evicted first (ties broken by lexically
    /// smallest key). Replacing an existing key never evicts.
    pub fn set(&self, order_uid: impl Into<String>, order: Order) {
        let order_uid = order_uid.into();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        Self::insert(&mut entries, self.capacity, order_uid, Arc::new(order));
    }

    /// Inserts many orders in one locked pass, applying the per-insert
    /// eviction rule as capacity is exceeded partway through.
    ///
    /// Entries are inserted in lexical key order so warm-up from a snapshot
    /// is reproducible.
    pub fn bulk_set(&self, orders: HashMap<String, Order>) {
        let mut orders: Vec<(String, Order)> = orders.into_iter().collect();
        orders.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut entries = self.entries.write().expect("cache lock poisoned");
        for (order_uid, order) in orders {
            Self::insert(&mut entries, self.capacity, order_uid, Arc::new(order));
        }
    }

    /// Number of entries currently held, including not-yet-swept expired
    /// ones.
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry whose age exceeds the TTL.
    pub fn sweep(&self) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() <= self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "swept expired cache entries");
        }
    }

    /// Stops the background sweeper. Entry data stays readable; only the
    /// periodic expiry pass ends.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().expect("sweeper lock poisoned").take() {
            handle.abort();
        }
    }

    fn insert(
        entries: &mut HashMap<String, CacheEntry>,
        capacity: usize,
        order_uid: String,
        order: Arc<Order>,
    ) {
        if !entries.contains_key(&order_uid) && entries.len() >= capacity {
            Self::evict_oldest(entries);
        }
        entries.insert(
            order_uid,
            CacheEntry {
                order,
                created_at: Instant::now(),
            },
        );
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) {
        let oldest = entries
            .iter()
            .min_by(|(key_a, a), (key_b, b)| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| key_a.cmp(key_b))
            })
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
            debug!(order_uid = %key, "evicted oldest cache entry");
        }
    }
}

impl Drop for OrderCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
