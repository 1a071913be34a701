//! Sharded in-memory authorization cache with TTL and epoch-fenced writes.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use rolegate_auth::AuthzCache;
use rolegate_core::Clock;

const DEFAULT_SHARDS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: bool,
    expires_at: DateTime<Utc>,
}

/// Process-wide authorization memo.
///
/// Keys are spread over independently locked shards. Reads take a shared
/// lock on one shard. Invalidation bumps the global epoch *before* sweeping
/// shards, and `set` re-checks the epoch under the shard's write lock, so a
/// value computed before an invalidation can never land after it.
pub struct ShardedAuthzCache {
    shards: Vec<RwLock<HashMap<String, Entry>>>,
    epoch: AtomicU64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ShardedAuthzCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::with_shards(DEFAULT_SHARDS, ttl, clock)
    }

    pub fn with_shards(shards: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
            epoch: AtomicU64::new(0),
            ttl,
            clock,
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, Entry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        &self.shards[idx]
    }

    /// Number of live entries (expired entries not yet evicted are counted).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().map(|m| m.len()).unwrap_or(0))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep<F>(&self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        for shard in &self.shards {
            match shard.write() {
                Ok(mut map) => map.retain(|k, _| keep(k.as_str())),
                Err(poisoned) => {
                    warn!("authorization cache shard poisoned; clearing it");
                    poisoned.into_inner().clear();
                }
            }
        }
    }
}

impl AuthzCache for ShardedAuthzCache {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn get(&self, key: &str) -> Option<bool> {
        let now = self.clock.now();
        let map = self.shard(key).read().ok()?;
        match map.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value),
            _ => None,
        }
    }

    fn set(&self, key: &str, value: bool, observed_epoch: u64) {
        let Ok(mut map) = self.shard(key).write() else {
            return;
        };
        if self.epoch.load(Ordering::SeqCst) != observed_epoch {
            debug!(key, "dropping authorization result computed before an invalidation");
            return;
        }
        let expires_at = self.clock.now() + self.ttl;
        map.insert(key.to_string(), Entry { value, expires_at });
    }

    fn invalidate_prefix(&self, prefix: &str) {
        self.sweep(|k| !k.starts_with(prefix));
        debug!(prefix, "authorization cache entries invalidated");
    }

    fn clear(&self) {
        self.sweep(|_| false);
        debug!("authorization cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::ManualClock;

    fn cache(clock: Arc<ManualClock>) -> ShardedAuthzCache {
        ShardedAuthzCache::new(Duration::seconds(300), clock)
    }

    #[test]
    fn set_then_get() {
        let c = cache(Arc::new(ManualClock::starting_now()));
        let e = c.epoch();
        c.set("authz:1:role:admin", true, e);
        assert_eq!(c.get("authz:1:role:admin"), Some(true));
        assert_eq!(c.get("authz:1:role:other"), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::starting_now());
        let c = cache(clock.clone());
        c.set("k", false, c.epoch());
        clock.advance(Duration::seconds(299));
        assert_eq!(c.get("k"), Some(false));
        clock.advance(Duration::seconds(1));
        assert_eq!(c.get("k"), None);
    }

    #[test]
    fn prefix_invalidation_is_scoped() {
        let c = cache(Arc::new(ManualClock::starting_now()));
        let e = c.epoch();
        c.set("authz:1:role:admin", true, e);
        c.set("authz:12:role:admin", true, e);

        c.invalidate_prefix("authz:1:");
        assert_eq!(c.get("authz:1:role:admin"), None);
        assert_eq!(c.get("authz:12:role:admin"), Some(true));
    }

    #[test]
    fn stale_write_after_invalidation_is_dropped() {
        let c = cache(Arc::new(ManualClock::starting_now()));
        let observed = c.epoch();
        // an invalidation races ahead of the write
        c.invalidate_prefix("authz:1:");
        c.set("authz:1:role:admin", true, observed);
        assert_eq!(c.get("authz:1:role:admin"), None);

        // a fresh read of the epoch can write again
        c.set("authz:1:role:admin", true, c.epoch());
        assert_eq!(c.get("authz:1:role:admin"), Some(true));
    }

    #[test]
    fn clear_empties_every_shard() {
        let c = cache(Arc::new(ManualClock::starting_now()));
        let e = c.epoch();
        for i in 0..100 {
            c.set(&format!("authz:{i}:role:x"), true, e);
        }
        assert_eq!(c.len(), 100);
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn concurrent_readers_and_invalidations() {
        let c = Arc::new(cache(Arc::new(ManualClock::starting_now())));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("authz:{t}:role:{i}");
                        c.set(&key, true, c.epoch());
                        let _ = c.get(&key);
                        if i % 50 == 0 {
                            c.invalidate_prefix(&format!("authz:{t}:"));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        c.clear();
        assert!(c.is_empty());
    }
}
