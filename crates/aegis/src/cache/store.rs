//! Dual-index key cache with a concurrently readable freshness projection.
//!
//! [`KeyCache`] is a passive structure owned by the service coordinator, the
//! sole writer. Three indexes cover the same entries and must stay in
//! lockstep:
//!
//! - by-uuid: `HashMap<Uuid, CacheEntry>`, the primary identity index;
//! - by-counter: `BTreeMap<u64, Uuid>`, recency order — the smallest counter
//!   is the least recently inserted-or-bumped entry and the LRU victim;
//! - freshness: a shared [`DashMap`] of `expires_at` seconds, readable from
//!   any caller thread without coordinating with the writer.
//!
//! Recency uses the synthetic counter rather than `last_accessed`: wall-clock
//! seconds collide, counters are unique, so the eviction victim is
//! deterministic. Every mutator takes the current unix time (and the counter
//! to assign) as arguments; the cache itself never reads the clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use aegis_common::{DbKey, Error};
use dashmap::DashMap;
use uuid::Uuid;

/// Inactivity threshold after which a lookup schedules a recency bump.
///
/// Hot entries get at most one bump per this many seconds, keeping
/// by-counter writes bounded regardless of lookup volume.
pub const LAST_ACCESSED_INACTIVITY_SEC: u64 = 10;

/// Lock-free projection of entry expiry times, keyed by database uuid.
///
/// This is the only cache state read outside the coordinator. The answer is
/// advisory: a reader may observe `true` for an entry a concurrent sweep
/// just deleted, and must treat the subsequent lookup miss as a stale entry.
#[derive(Clone, Debug, Default)]
pub struct FreshnessIndex {
    inner: Arc<DashMap<Uuid, u64>>,
}

impl FreshnessIndex {
    /// Create a new, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` iff an expiry is recorded for `uuid` and it has not
    /// passed at `now` (unix seconds).
    pub fn is_fresh(&self, uuid: &Uuid, now: u64) -> bool {
        self.inner.get(uuid).is_some_and(|e| *e >= now)
    }

    /// Number of entries currently recorded.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no entries are recorded.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn set(&self, uuid: Uuid, expires_at: u64) {
        self.inner.insert(uuid, expires_at);
    }

    fn remove(&self, uuid: &Uuid) -> bool {
        self.inner.remove(uuid).is_some()
    }
}

/// A cached database key with its recency and expiry metadata.
#[derive(Debug)]
struct CacheEntry {
    db_key: DbKey,
    /// Recency sequence number; unique across live entries.
    counter: u64,
    /// Unix seconds at the last observed access.
    last_accessed: u64,
    /// Unix seconds at which this entry becomes stale. Fixed at insert.
    expires_at: u64,
}

/// Result of a cache lookup.
#[derive(Debug)]
pub struct Lookup {
    /// The cached database key.
    pub db_key: DbKey,
    /// `true` when the entry has been inactive past
    /// [`LAST_ACCESSED_INACTIVITY_SEC`] and a recency bump should be
    /// scheduled.
    pub needs_bump: bool,
}

/// The coordinator-owned key cache.
#[derive(Debug)]
pub struct KeyCache {
    by_uuid: HashMap<Uuid, CacheEntry>,
    by_counter: BTreeMap<u64, Uuid>,
    freshness: FreshnessIndex,
}

impl KeyCache {
    /// Create an empty cache publishing expiry times into `freshness`.
    pub fn new(freshness: FreshnessIndex) -> Self {
        Self {
            by_uuid: HashMap::new(),
            by_counter: BTreeMap::new(),
            freshness,
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }

    /// Insert a key for `uuid`, replacing any prior entry, then evict the
    /// LRU entry if the cache has grown past `cache_limit`.
    ///
    /// The new entry gets `counter`, `last_accessed = now`, and
    /// `expires_at = now + max_age_sec`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] on counter reuse or index divergence;
    /// either indicates a coordinator bug and the cache must be discarded.
    pub fn insert(
        &mut self,
        uuid: Uuid,
        db_key: DbKey,
        counter: u64,
        now: u64,
        max_age_sec: u64,
        cache_limit: usize,
    ) -> Result<(), Error> {
        if self.by_uuid.contains_key(&uuid) {
            self.delete(&uuid)?;
        }

        if let Some(holder) = self.by_counter.insert(counter, uuid) {
            return Err(Error::Internal(format!(
                "counter {counter} already assigned to {holder}"
            )));
        }
        let expires_at = now + max_age_sec;
        self.by_uuid.insert(
            uuid,
            CacheEntry {
                db_key,
                counter,
                last_accessed: now,
                expires_at,
            },
        );
        self.freshness.set(uuid, expires_at);

        // The insert crossed the bound by at most one entry.
        if self.by_uuid.len() > cache_limit {
            self.evict_lru()?;
        }
        Ok(())
    }

    /// Read the key for `uuid`, reporting whether a recency bump is due.
    pub fn lookup(&self, uuid: &Uuid, now: u64) -> Option<Lookup> {
        self.by_uuid.get(uuid).map(|entry| Lookup {
            db_key: entry.db_key.clone(),
            needs_bump: now.saturating_sub(entry.last_accessed) > LAST_ACCESSED_INACTIVITY_SEC,
        })
    }

    /// Move `uuid` to the most-recent position, assigning it `counter` and
    /// `last_accessed = now`. The expiry is unchanged.
    ///
    /// A bump for an absent uuid is a no-op: bumps are best-effort and may
    /// lose the race against eviction or re-insert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the entry's recency row is missing or
    /// `counter` is already taken.
    pub fn bump(&mut self, uuid: &Uuid, counter: u64, now: u64) -> Result<(), Error> {
        let Some(entry) = self.by_uuid.get_mut(uuid) else {
            return Ok(());
        };
        if self.by_counter.remove(&entry.counter).is_none() {
            return Err(Error::Internal(format!(
                "recency row missing for {uuid} at counter {}",
                entry.counter
            )));
        }
        if let Some(holder) = self.by_counter.insert(counter, *uuid) {
            return Err(Error::Internal(format!(
                "counter {counter} already assigned to {holder}"
            )));
        }
        entry.counter = counter;
        entry.last_accessed = now;
        Ok(())
    }

    /// Delete every entry whose expiry has passed at `now`, returning how
    /// many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the three indexes do not account for
    /// the same deletions — a prior invariant break, never repaired here.
    pub fn sweep_expired(&mut self, now: u64) -> Result<usize, Error> {
        let expired: Vec<Uuid> = self
            .by_uuid
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(uuid, _)| *uuid)
            .collect();
        for uuid in &expired {
            self.delete(uuid)?;
        }
        Ok(expired.len())
    }

    /// Remove `uuid` from all three indexes.
    fn delete(&mut self, uuid: &Uuid) -> Result<(), Error> {
        let Some(entry) = self.by_uuid.remove(uuid) else {
            return Err(Error::Internal(format!("{uuid} missing from by-uuid")));
        };
        let recency = self.by_counter.remove(&entry.counter).is_some();
        let fresh = self.freshness.remove(uuid);
        if !recency || !fresh {
            return Err(Error::Internal(format!(
                "index divergence deleting {uuid}: by-counter={recency} freshness={fresh}"
            )));
        }
        Ok(())
    }

    /// Evict the entry with the smallest counter.
    fn evict_lru(&mut self) -> Result<(), Error> {
        let Some(victim) = self.by_counter.first_key_value().map(|(_, u)| *u) else {
            return Err(Error::Internal("eviction requested on empty recency index".into()));
        };
        self.delete(&victim)
    }
}
