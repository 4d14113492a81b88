//! Per-user history store
//!
//! Users are spread over a fixed number of mutex-guarded shards, so updates
//! for the same user serialize while unrelated users rarely contend. With an
//! idle TTL, users whose newest entry is older than the TTL are dropped.

use crate::{DetectionHistoryEntry, HistoryRing, UserId, DEFAULT_CAPACITY};
use chrono::{DateTime, Duration, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Default shard count
pub const DEFAULT_SHARDS: usize = 16;

/// Records into a shard between idle sweeps of that shard
pub const SWEEP_INTERVAL: u32 = 64;

/// Storage for per-user detection history
pub trait HistoryStore: Send + Sync {
    /// Append an entry and return the user's history (oldest first),
    /// including the new entry, as one atomic step
    fn record(&self, user_id: UserId, entry: DetectionHistoryEntry) -> Vec<DetectionHistoryEntry>;

    /// Current history for a user, oldest first
    fn snapshot(&self, user_id: UserId) -> Vec<DetectionHistoryEntry>;

    /// Forget a user's history
    fn clear(&self, user_id: UserId);
}

#[derive(Default)]
struct Shard {
    rings: HashMap<UserId, HistoryRing>,
    records_since_sweep: u32,
}

impl Shard {
    /// Drop users with no entry at or after `cutoff`
    fn sweep(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.rings.len();
        self.rings
            .retain(|_, ring| ring.latest().is_some_and(|e| e.timestamp >= cutoff));
        self.records_since_sweep = 0;
        before - self.rings.len()
    }
}

/// In-memory sharded history store
pub struct ShardedHistoryStore {
    shards: Box<[Mutex<Shard>]>,
    /// Entries kept per user
    capacity: usize,
    /// Idle users are forgotten after this long
    idle_ttl: Option<Duration>,
}

impl ShardedHistoryStore {
    /// Create a store keeping `capacity` entries per user
    pub fn new(capacity: usize) -> Self {
        Self::with_shards(capacity, DEFAULT_SHARDS)
    }

    pub fn with_shards(capacity: usize, shards: usize) -> Self {
        let shards: Vec<Mutex<Shard>> = (0..shards.max(1)).map(|_| Mutex::new(Shard::default())).collect();
        Self {
            shards: shards.into_boxed_slice(),
            capacity,
            idle_ttl: None,
        }
    }

    /// Forget users whose newest entry is older than `ttl`. Each shard is
    /// swept every [`SWEEP_INTERVAL`] records; [`prune_idle`](Self::prune_idle)
    /// sweeps everything on demand.
    pub fn with_idle_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.idle_ttl = Duration::from_std(ttl).ok();
        if self.idle_ttl.is_none() {
            warn!(?ttl, "History idle TTL out of range, idle users are kept");
        }
        self
    }

    /// Sweep all shards, returning the number of users dropped
    pub fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self.cutoff(now) else {
            return 0;
        };
        let dropped: usize = (0..self.shards.len()).map(|i| self.lock_shard(i).sweep(cutoff)).sum();
        if dropped > 0 {
            debug!(dropped, "Pruned idle detection histories");
        }
        dropped
    }

    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.idle_ttl.and_then(|ttl| now.checked_sub_signed(ttl))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of users with recorded history
    pub fn user_count(&self) -> usize {
        (0..self.shards.len()).map(|i| self.lock_shard(i).rings.len()).sum()
    }

    /// Total entries ever recorded for a user
    pub fn total_recorded(&self, user_id: UserId) -> u64 {
        self.lock_user(user_id)
            .rings
            .get(&user_id)
            .map_or(0, HistoryRing::total_pushed)
    }

    fn shard_index(&self, user_id: UserId) -> usize {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    fn lock_user(&self, user_id: UserId) -> MutexGuard<'_, Shard> {
        self.lock_shard(self.shard_index(user_id))
    }

    fn lock_shard(&self, index: usize) -> MutexGuard<'_, Shard> {
        // History is a soft heuristic; a panic elsewhere must not disable it
        self.shards[index].lock().unwrap_or_else(|poisoned| {
            warn!("History shard {} was poisoned, recovering", index);
            poisoned.into_inner()
        })
    }
}

impl HistoryStore for ShardedHistoryStore {
    fn record(&self, user_id: UserId, entry: DetectionHistoryEntry) -> Vec<DetectionHistoryEntry> {
        let at = entry.timestamp;
        let mut shard = self.lock_user(user_id);
        let ring = shard
            .rings
            .entry(user_id)
            .or_insert_with(|| HistoryRing::new(self.capacity));
        ring.push(entry);
        debug!(user_id, entries = ring.len(), "Recorded detection");
        let history = ring.to_vec();

        shard.records_since_sweep += 1;
        if shard.records_since_sweep >= SWEEP_INTERVAL {
            match self.cutoff(at) {
                Some(cutoff) => {
                    shard.sweep(cutoff);
                }
                None => shard.records_since_sweep = 0,
            }
        }
        history
    }

    fn snapshot(&self, user_id: UserId) -> Vec<DetectionHistoryEntry> {
        self.lock_user(user_id)
            .rings
            .get(&user_id)
            .map(HistoryRing::to_vec)
            .unwrap_or_default()
    }

    fn clear(&self, user_id: UserId) {
        self.lock_user(user_id).rings.remove(&user_id);
    }
}

impl Default for ShardedHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distress_fusion::Severity;
    use std::sync::Arc;
    use std::thread;

    fn entry(score: f64) -> DetectionHistoryEntry {
        DetectionHistoryEntry {
            timestamp: Utc::now(),
            score,
            severity: Severity::Medium,
            is_crisis: false,
        }
    }

    #[test]
    fn test_record_returns_history_with_new_entry() {
        let store = ShardedHistoryStore::default();
        store.record(1, entry(0.1));
        let history = store.record(1, entry(0.2));

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].score, 0.2);
        assert!(store.snapshot(2).is_empty());
    }

    #[test]
    fn test_capacity_enforced_per_user() {
        let store = ShardedHistoryStore::new(3);
        for i in 0..5 {
            store.record(7, entry(i as f64));
        }
        store.record(8, entry(9.0));

        let history = store.snapshot(7);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].score, 2.0);
        assert_eq!(store.snapshot(8).len(), 1);
        assert_eq!(store.user_count(), 2);
    }

    #[test]
    fn test_clear() {
        let store = ShardedHistoryStore::default();
        store.record(1, entry(0.5));
        store.clear(1);
        assert!(store.snapshot(1).is_empty());
        assert_eq!(store.total_recorded(1), 0);
    }

    fn entry_at(at: DateTime<Utc>) -> DetectionHistoryEntry {
        DetectionHistoryEntry {
            timestamp: at,
            ..entry(0.5)
        }
    }

    #[test]
    fn test_prune_idle_drops_stale_users() {
        let now = Utc::now();
        let store = ShardedHistoryStore::default().with_idle_ttl(std::time::Duration::from_secs(600));
        for user in 1..=3 {
            store.record(user, entry_at(now - Duration::hours(1)));
        }
        store.record(4, entry_at(now - Duration::minutes(1)));

        assert_eq!(store.prune_idle(now), 3);
        assert_eq!(store.user_count(), 1);
        assert_eq!(store.snapshot(4).len(), 1);
    }

    #[test]
    fn test_recording_sweeps_idle_users() {
        let now = Utc::now();
        let store = ShardedHistoryStore::with_shards(10, 1).with_idle_ttl(std::time::Duration::from_secs(600));
        store.record(1, entry_at(now - Duration::hours(2)));
        for _ in 0..SWEEP_INTERVAL {
            store.record(2, entry_at(now));
        }

        assert!(store.snapshot(1).is_empty());
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_without_ttl_users_are_kept() {
        let store = ShardedHistoryStore::default();
        store.record(1, entry_at(Utc::now() - Duration::days(30)));
        assert_eq!(store.prune_idle(Utc::now()), 0);
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_concurrent_updates_not_lost() {
        let store = Arc::new(ShardedHistoryStore::with_shards(10, 4));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        store.record(42, entry(i as f64));
                        store.record(t, entry(i as f64));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.total_recorded(42), 800);
        assert_eq!(store.snapshot(42).len(), 10);
        assert_eq!(store.total_recorded(3), 100);
    }
}
