//! Per-type method cache
//!
//! Maps `(type, interned name identity)` to the resolved method. Only interned
//! names are cached; a transient name's identity is not stable. Misses are not
//! cached, so every distinct name resolves directly at least once.
//!
//! Each entry holds its name's text, so the address behind an identity can't be
//! reused while the entry lives, even after the issuing [`NameTable`] is dropped.
//!
//! [`NameTable`]: crate::name::NameTable
//!
//! # Invalidation
//!
//! Every invalidation bumps a generation counter. A lookup records the
//! generation before resolving and only inserts its result if nothing was
//! invalidated in between, so a result computed against a stale namespace is
//! never cached.

use crate::method::Method;
use crate::name::Name;
use crate::registry::TypeId;
use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Cached method together with the name text its key was taken from
type Entry = (Arc<str>, Method);

// =============================================================================
// Statistics
// =============================================================================

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to direct resolution
    pub misses: u64,
    /// Invalidations (per type or global)
    pub invalidations: u64,
}

// =============================================================================
// Method Cache
// =============================================================================

/// Cache of resolved methods keyed by type and name identity
pub struct MethodCache {
    types: DashMap<TypeId, FxHashMap<usize, Entry>, FxBuildHasher>,
    capacity_per_type: Option<usize>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl MethodCache {
    /// Create an empty cache
    pub fn new(capacity_per_type: Option<usize>) -> Self {
        Self {
            types: DashMap::with_hasher(FxBuildHasher::default()),
            capacity_per_type,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Current invalidation generation
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cached method for an interned name
    pub fn get(&self, class: TypeId, name: &Name) -> Option<Method> {
        let found = self
            .types
            .get(&class)
            .and_then(|entries| {
                entries
                    .get(&name.identity())
                    .filter(|(text, _)| Arc::ptr_eq(text, name.text()))
                    .map(|(_, method)| method.clone())
            });
        match found {
            Some(method) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(method)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Record a resolved method if no invalidation happened since `generation`
    pub fn insert(&self, class: TypeId, name: &Name, method: Method, generation: u64) -> bool {
        if !name.is_interned() || self.generation() != generation {
            return false;
        }
        let mut entries = self.types.entry(class).or_default();
        if let Some(limit) = self.capacity_per_type {
            if entries.len() >= limit && !entries.contains_key(&name.identity()) {
                entries.clear();
            }
        }
        entries.insert(name.identity(), (name.text().clone(), method));
        true
    }

    /// Drop one type's entries, or every entry when `class` is `None`
    pub fn invalidate(&self, class: Option<TypeId>) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        match class {
            Some(class) => {
                self.types.remove(&class);
            }
            None => self.types.clear(),
        }
    }

    /// Number of cached entries for a type
    pub fn len_for(&self, class: TypeId) -> usize {
        self.types.get(&class).map(|entries| entries.len()).unwrap_or(0)
    }

    /// Total number of cached entries
    pub fn len(&self) -> usize {
        self.types.iter().map(|entries| entries.len()).sum()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl Default for MethodCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MethodCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodCache")
            .field("types", &self.types.len())
            .field("capacity_per_type", &self.capacity_per_type)
            .field("stats", &self.stats())
            .finish()
    }
}
