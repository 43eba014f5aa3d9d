//! Tenant-scoped key/value stores with lazy expiry.
//!
//! Expired entries behave exactly like absent ones; they are only physically
//! removed by [`ExpiringStore::sweep`] or when a reader trips over them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::clock::{Clock, later};

type Key = (String, String);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

pub struct ExpiringStore<V> {
    name: &'static str,
    entries: DashMap<Key, Entry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ExpiringStore<V> {
    pub fn new(name: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stores `value` for `ttl`, replacing any previous entry.
    pub fn put(&self, tenant: &str, key: &str, value: V, ttl: Duration) {
        let expires_at = later(self.clock.now(), ttl);
        self.put_until(tenant, key, value, expires_at);
    }

    pub fn put_until(&self, tenant: &str, key: &str, value: V, expires_at: DateTime<Utc>) {
        self.entries
            .insert(key_of(tenant, key), Entry { value, expires_at });
    }

    /// A copy of the live value.
    pub fn get(&self, tenant: &str, key: &str) -> Option<V> {
        let key = key_of(tenant, key);
        let now = self.clock.now();
        let value = self
            .entries
            .get(&key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()))?;
        if value.is_none() {
            self.entries.remove_if(&key, |_, entry| entry.expires_at <= now);
        }
        value
    }

    /// Removes the entry and returns it if it was still live.
    ///
    /// Removal is a single map operation, so of several concurrent callers
    /// at most one receives the value.
    pub fn take(&self, tenant: &str, key: &str) -> Option<V> {
        let now = self.clock.now();
        self.entries
            .remove(&key_of(tenant, key))
            .map(|(_, entry)| entry)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
    }

    /// Changes a live entry in place without touching its expiry.
    /// Returns `false` when there is nothing live to change.
    pub fn update(&self, tenant: &str, key: &str, f: impl FnOnce(&mut V)) -> bool {
        let now = self.clock.now();
        match self.entries.get_mut(&key_of(tenant, key)) {
            Some(mut entry) if entry.expires_at > now => {
                f(&mut entry.value);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, tenant: &str, key: &str) -> bool {
        self.entries.remove(&key_of(tenant, key)).is_some()
    }

    /// Drops every expired entry and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> fmt::Debug for ExpiringStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn key_of(tenant: &str, key: &str) -> Key {
    (tenant.to_owned(), key.to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::clock::ManualClock;

    use super::*;

    fn store() -> (Arc<ManualClock>, ExpiringStore<String>) {
        let clock = Arc::new(ManualClock::default());
        let store = ExpiringStore::new("codes", clock.clone());
        (clock, store)
    }

    #[test]
    fn entries_are_tenant_scoped() {
        let (_, store) = store();
        store.put("master", "k", "a".into(), Duration::from_secs(60));
        assert_eq!(store.get("master", "k").as_deref(), Some("a"));
        assert_eq!(store.get("other", "k"), None);
    }

    #[test]
    fn expired_entries_look_absent() {
        let (clock, store) = store();
        store.put("master", "k", "a".into(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(61));

        assert_eq!(store.get("master", "k"), None);
        assert_eq!(store.take("master", "k"), None);
        assert!(!store.update("master", "k", |v| v.push('!')));
    }

    #[test]
    fn take_succeeds_once() {
        let (_, store) = store();
        store.put("master", "k", "a".into(), Duration::from_secs(60));
        assert_eq!(store.take("master", "k").as_deref(), Some("a"));
        assert_eq!(store.take("master", "k"), None);
    }

    #[test]
    fn update_keeps_expiry() {
        let (clock, store) = store();
        store.put("master", "k", "a".into(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(30));
        assert!(store.update("master", "k", |v| v.push('b')));
        assert_eq!(store.get("master", "k").as_deref(), Some("ab"));

        clock.advance(Duration::from_secs(31));
        assert_eq!(store.get("master", "k"), None);
    }

    #[test]
    fn sweep_drops_only_expired() {
        let (clock, store) = store();
        store.put("master", "short", "a".into(), Duration::from_secs(10));
        store.put("master", "long", "b".into(), Duration::from_secs(100));
        clock.advance(Duration::from_secs(20));

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("master", "long").is_some());
    }

    #[test]
    fn concurrent_takes_have_one_winner() {
        let (_, store) = store();
        let store = Arc::new(store);
        store.put("master", "code", "v".into(), Duration::from_secs(60));

        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if store.take("master", "code").is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
