//! Per-session module cache and byte accounting
//!
//! The cache holds one slot per resolved path. A slot is created on first
//! lookup and filled by whichever resolution got there first; later lookups
//! for the same path wait on that slot instead of loading again. Nothing is
//! ever evicted: the cache lives exactly as long as its linker.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;

/// Shared, lazily filled cache slot.
pub type ModuleSlot<M> = Rc<OnceCell<M>>;

/// Module records by resolved path.
#[derive(Debug)]
pub struct ModuleCache<M> {
    slots: FxHashMap<PathBuf, ModuleSlot<M>>,
    failures: FxHashMap<PathBuf, usize>,
    hits: usize,
    misses: usize,
}

impl<M> Default for ModuleCache<M> {
    fn default() -> Self {
        Self {
            slots: FxHashMap::default(),
            failures: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<M> ModuleCache<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `path`, created empty if this is the first lookup.
    pub fn slot(&mut self, path: &Path) -> ModuleSlot<M> {
        self.slots
            .entry(path.to_path_buf())
            .or_insert_with(|| Rc::new(OnceCell::new()))
            .clone()
    }

    /// Completed record for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<&M> {
        self.slots.get(path).and_then(|slot| slot.get())
    }

    /// Whether `path` has a completed record.
    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Count a failed load of `path`. The slot itself stays empty.
    pub fn record_failure(&mut self, path: &Path) {
        *self.failures.entry(path.to_path_buf()).or_insert(0) += 1;
    }

    /// Failed loads of `path` so far.
    pub fn failures(&self, path: &Path) -> usize {
        self.failures.get(path).copied().unwrap_or(0)
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Number of completed records.
    pub fn len(&self) -> usize {
        self.slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Paths with completed records.
    pub fn cached_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(path, _)| path)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Lookups served without loading
    pub hits: usize,
    /// Lookups that loaded and transformed
    pub misses: usize,
}

impl CacheStats {
    /// Get cache hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Everything the host needs to know about what a session pulled in.
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    paths: BTreeSet<PathBuf>,
    sizes: FxHashMap<PathBuf, usize>,
    source_maps: FxHashMap<PathBuf, String>,
}

impl ReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_path(&mut self, path: &Path) {
        if !self.paths.contains(path) {
            self.paths.insert(path.to_path_buf());
        }
    }

    /// Record the size of `path`. Only the first observation counts.
    pub fn record_size(&mut self, path: &Path, size: usize) {
        if !self.sizes.contains_key(path) {
            self.sizes.insert(path.to_path_buf(), size);
        }
    }

    pub fn record_source_map(&mut self, path: &Path, map: String) {
        self.source_maps.insert(path.to_path_buf(), map);
    }

    pub fn paths(&self) -> &BTreeSet<PathBuf> {
        &self.paths
    }

    pub fn size_of(&self, path: &Path) -> Option<usize> {
        self.sizes.get(path).copied()
    }

    /// Sum of first-observed sizes over distinct paths.
    pub fn total_size(&self) -> usize {
        self.sizes.values().sum()
    }

    pub fn source_maps(&self) -> &FxHashMap<PathBuf, String> {
        &self.source_maps
    }
}
