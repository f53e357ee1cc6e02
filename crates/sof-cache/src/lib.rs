//! # SOF Cache - Call Access Memoization
//!
//! Remembers delegated access decisions so an enforced target does not pay
//! for a decision-system call on every invocation.
//!
//! Every key carries the revision of the access configuration it was decided
//! under. Rewriting a configuration bumps its revision, so stale entries can
//! no longer be hit even before they are explicitly invalidated. Keys also
//! carry a digest of the call context, since a decision may depend on the
//! arguments of the gated call.
//!
//! Decisions are computed outside the cache and may race an invalidation.
//! Callers read [`AccessCache::generation`] before deciding and store through
//! [`AccessCache::put_at`], which refuses a decision that an invalidation has
//! overtaken.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::notification::RemovalCause;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sof_const::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECONDS};
use sof_types::{Account, Decision, FunctionSelector, SystemId};
use tracing::debug;

/// Cache key for one (target, caller) decision
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAccessKey {
    pub target_system: SystemId,
    pub target_function: FunctionSelector,
    pub caller: Account,
    /// Revision of the access configuration the decision was made under
    pub config_revision: u64,
    /// SHA-256 of the serialized call context
    pub context_digest: Option<[u8; 32]>,
}

impl CallAccessKey {
    pub fn new(
        target_system: SystemId,
        target_function: FunctionSelector,
        caller: Account,
        config_revision: u64,
    ) -> Self {
        Self {
            target_system,
            target_function,
            caller,
            config_revision,
            context_digest: None,
        }
    }

    /// Bind the key to the context of the gated call
    pub fn with_context(mut self, context: Option<&serde_json::Value>) -> Self {
        // serde_json objects serialize with sorted keys
        self.context_digest = context.map(|value| Sha256::digest(value.to_string().as_bytes()).into());
        self
    }

    fn target(&self) -> Target {
        (self.target_system, self.target_function)
    }
}

type Target = (SystemId, FunctionSelector);

/// Secondary indexes from targets and callers to their live keys
#[derive(Default)]
struct KeyIndex {
    by_target: HashMap<Target, HashSet<CallAccessKey>>,
    by_caller: HashMap<Account, HashSet<CallAccessKey>>,
}

impl KeyIndex {
    fn insert(&mut self, key: CallAccessKey) {
        self.by_target.entry(key.target()).or_default().insert(key);
        self.by_caller.entry(key.caller).or_default().insert(key);
    }

    fn remove(&mut self, key: &CallAccessKey) {
        unlink(&mut self.by_target, &key.target(), key);
        unlink(&mut self.by_caller, &key.caller, key);
    }

    fn take_target(&mut self, target: &Target) -> HashSet<CallAccessKey> {
        let keys = self.by_target.remove(target).unwrap_or_default();
        for key in &keys {
            unlink(&mut self.by_caller, &key.caller, key);
        }
        keys
    }

    fn take_caller(&mut self, caller: &Account) -> HashSet<CallAccessKey> {
        let keys = self.by_caller.remove(caller).unwrap_or_default();
        for key in &keys {
            unlink(&mut self.by_target, &key.target(), key);
        }
        keys
    }

    fn clear(&mut self) {
        self.by_target.clear();
        self.by_caller.clear();
    }

    fn len(&self) -> usize {
        self.by_caller.values().map(HashSet::len).sum()
    }
}

fn unlink<G: std::hash::Hash + Eq>(
    index: &mut HashMap<G, HashSet<CallAccessKey>>,
    group: &G,
    key: &CallAccessKey,
) {
    if let Some(keys) = index.get_mut(group) {
        keys.remove(key);
        if keys.is_empty() {
            index.remove(group);
        }
    }
}

/// In-memory cache of call-access decisions
pub struct AccessCache {
    decisions: Cache<CallAccessKey, Decision>,
    /// Never held across an await; the eviction listener locks it too
    index: Arc<Mutex<KeyIndex>>,
    /// Bumped by every invalidation
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl AccessCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let index = Arc::new(Mutex::new(KeyIndex::default()));
        let evicted_from = Arc::clone(&index);
        let decisions = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .eviction_listener(move |key: Arc<CallAccessKey>, _: Decision, cause: RemovalCause| {
                // Explicit removals prune the index themselves
                if cause.was_evicted() {
                    evicted_from.lock().remove(&key);
                }
            })
            .build();

        Self {
            decisions,
            index,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Get a cached decision, recording a hit or a miss
    pub async fn get(&self, key: &CallAccessKey) -> Option<Decision> {
        let result = self.decisions.get(key).await;
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Get a cached decision without touching the statistics
    pub async fn peek(&self, key: &CallAccessKey) -> Option<Decision> {
        self.decisions.get(key).await
    }

    /// Invalidation counter to pass to [`put_at`](Self::put_at)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache a decision unconditionally
    pub async fn put(&self, key: CallAccessKey, decision: Decision) {
        self.put_at(key, decision, self.generation()).await;
    }

    /// Cache a decision computed when the cache was at `generation`.
    /// Returns `false`, caching nothing, if an invalidation ran since.
    pub async fn put_at(&self, key: CallAccessKey, decision: Decision, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }

        self.decisions.insert(key, decision).await;
        self.index.lock().insert(key);

        // An invalidation that ran while inserting may have missed the key
        if self.generation() != generation {
            self.index.lock().remove(&key);
            self.decisions.invalidate(&key).await;
            debug!(caller = %key.caller, "Dropped decision overtaken by invalidation");
            return false;
        }
        true
    }

    fn begin_invalidation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    async fn drop_keys(&self, keys: &HashSet<CallAccessKey>) {
        for key in keys {
            self.decisions.invalidate(key).await;
        }
    }

    /// Drop every decision made for a target
    pub async fn invalidate_target(&self, system: &SystemId, function: &FunctionSelector) {
        self.begin_invalidation();
        let keys = self.index.lock().take_target(&(*system, *function));
        self.drop_keys(&keys).await;
        debug!(system = %system.label(), function = %function, dropped = keys.len(), "Invalidated target decisions");
    }

    /// Drop every decision made for a caller
    pub async fn invalidate_caller(&self, caller: &Account) {
        self.begin_invalidation();
        let keys = self.index.lock().take_caller(caller);
        self.drop_keys(&keys).await;
        debug!(%caller, dropped = keys.len(), "Invalidated caller decisions");
    }

    /// Invalidate all cache entries
    pub async fn invalidate_all(&self) {
        self.begin_invalidation();
        self.index.lock().clear();
        self.decisions.invalidate_all();
    }

    /// Number of keys reachable through the target and caller indexes
    pub fn indexed_keys(&self) -> usize {
        self.index.lock().len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        let total_requests = hits + misses;
        let hit_rate = if total_requests > 0 {
            (hits as f64 / total_requests as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entry_count: self.decisions.entry_count(),
            hits,
            misses,
            hit_rate,
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Apply moka's pending maintenance, delivering evictions
    pub async fn run_pending_tasks(&self) {
        self.decisions.run_pending_tasks().await;
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }
}

impl Default for AccessCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_CACHE_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
        )
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Approximate; moka applies pending maintenance lazily
    pub entry_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub invalidations: u64,
}
