//! Expiring key/value store
//!
//! Every entry carries its own TTL. Expiry is checked on read: an expired
//! entry is treated as absent and dropped at that point. `purge_expired`
//! removes everything stale in one sweep.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cloneable handle to a shared TTL map
#[derive(Debug)]
pub struct ExpiringStore<K, V> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
}

impl<K, V> Clone for ExpiringStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for ExpiringStore<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key, Entry { value, expires_at });
    }

    /// Live value for `key`, if any
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Expired: drop it unless it was replaced in the meantime
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    /// Remove `key` and return its value if it was still live
    pub async fn take(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let entry = self.entries.write().await.remove(key)?;
        (!entry.is_expired(now)).then_some(entry.value)
    }

    /// Remove `key` only if its live value satisfies `matches`
    ///
    /// Compare and removal happen under one write lock. Returns `None` when
    /// there is no live entry, `Some(false)` when the value did not match
    /// (the entry stays), `Some(true)` when it was removed.
    pub async fn take_if<F>(&self, key: &K, matches: F) -> Option<bool>
    where
        F: FnOnce(&V) -> bool,
    {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries.get(key)?;

        if entry.is_expired(now) {
            entries.remove(key);
            return None;
        }
        if !matches(&entry.value) {
            return Some(false);
        }
        entries.remove(key);
        Some(true)
    }

    /// Remove `key`; returns whether a live entry was removed
    pub async fn remove(&self, key: &K) -> bool {
        self.take(key).await.is_some()
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} expired entries", purged);
        }
        purged
    }

    /// Number of stored entries, expired ones not yet purged included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
