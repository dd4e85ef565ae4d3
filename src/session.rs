//! Short-lived session cache of resolved principals.
//!
//! Holds only `id -> Principal` (roles and activation). Entries expire after the configured TTL
//! and are invalidated on role change, activation change, deletion and logout. Decisions are
//! never cached: every guard and handler still calls `authorize` on the cached principal.
//!
//! A per-user generation counter stops a lookup that started before an invalidation from
//! re-inserting the stale principal afterwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    access::Principal,
    repository::{RepoResult, Repository},
};

struct CachedPrincipal {
    principal: Principal,
    cached_at: Instant,
}

/// SessionCache
pub struct SessionCache {
    ttl: Duration,
    entries: DashMap<Uuid, CachedPrincipal>,
    generations: DashMap<Uuid, Arc<AtomicU64>>,
}

/// SessionState
///
/// Shared handle stored in the application state.
pub type SessionState = Arc<SessionCache>;

impl SessionCache {
    /// A zero TTL disables caching entirely.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    fn generation(&self, id: Uuid) -> Arc<AtomicU64> {
        self.generations
            .entry(id)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    /// get
    ///
    /// A live entry, if any. Expired entries are dropped on the way out.
    pub fn get(&self, id: Uuid) -> Option<Principal> {
        if self.ttl.is_zero() {
            return None;
        }
        let fresh = self
            .entries
            .get(&id)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.principal.clone());
        if fresh.is_none() {
            self.entries.remove(&id);
        }
        fresh
    }

    /// resolve
    ///
    /// Cached principal, or a fresh load from the repository which is then cached.
    pub async fn resolve(
        &self,
        repo: &dyn Repository,
        id: Uuid,
    ) -> RepoResult<Option<Principal>> {
        if self.ttl.is_zero() {
            return repo.load_principal(id).await;
        }
        if let Some(principal) = self.get(id) {
            return Ok(Some(principal));
        }

        let generation = self.generation(id);
        let before = generation.load(Ordering::Acquire);

        let loaded = repo.load_principal(id).await;

        if let Ok(Some(principal)) = &loaded {
            // The shard lock is held across the check, so an invalidation either bumps the
            // generation first or removes the entry after this insert.
            let slot = self.entries.entry(id);
            if generation.load(Ordering::Acquire) == before {
                slot.insert(CachedPrincipal {
                    principal: principal.clone(),
                    cached_at: Instant::now(),
                });
            }
        }

        drop(generation);
        self.release_generation(id);
        loaded
    }

    /// invalidate
    ///
    /// Drops the entry so the next request reloads roles and activation from the store.
    pub fn invalidate(&self, id: Uuid) {
        self.generation(id).fetch_add(1, Ordering::AcqRel);
        self.entries.remove(&id);
        self.release_generation(id);
        tracing::debug!(user = %id, "session cache entry invalidated");
    }

    // Counters only matter while a load is in flight; the last holder removes it.
    fn release_generation(&self, id: Uuid) {
        self.generations
            .remove_if(&id, |_, counter| Arc::strong_count(counter) == 1);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
