//! Cache Store Module
//!
//! In-memory store for named configuration documents with dirty tracking,
//! last-access timestamps, and version control. Pure bookkeeping: no I/O,
//! no timers. This is the only place the store invariants are enforced:
//! a dirty name is always cached, and a last-access time exists iff the
//! name is cached.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::cache::{current_timestamp_ms, CacheEntry};
use crate::error::{CacheError, Result};

// == Dirty Mark ==
/// Outcome of [`CacheStore::mark_dirty`].
///
/// Marking an unknown name is an expected race (eviction vs. mutation),
/// so it is reported rather than raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyMark {
    /// The config was cached and is now marked dirty
    Marked,
    /// The config is not cached; nothing was marked
    NotCached,
}

// == Cache Store ==
/// In-memory config cache with dirty tracking and access timestamps.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Name to document storage
    entries: HashMap<String, CacheEntry>,
    /// Names whose in-memory value may differ from the persisted value
    dirty: HashSet<String>,
    /// Last access timestamp (Unix milliseconds) per cached name
    last_access: HashMap<String, u64>,
    /// Names flagged for reload on next host access
    invalidated: HashSet<String>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new empty CacheStore.
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Retrieves a config document by name, refreshing its access time.
    ///
    /// Returns a clone of the cached value so callers can never mutate
    /// the cache in place.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        match self.entries.get(name) {
            Some(entry) => {
                self.last_access
                    .insert(name.to_string(), current_timestamp_ms());
                Ok(entry.data.clone())
            }
            None => Err(CacheError::NotFound(name.to_string())),
        }
    }

    // == Get With Version ==
    /// Retrieves a config together with its version, refreshing its access time.
    pub fn get_with_version(&mut self, name: &str) -> Result<CacheEntry> {
        match self.entries.get(name) {
            Some(entry) => {
                self.last_access
                    .insert(name.to_string(), current_timestamp_ms());
                Ok(entry.clone())
            }
            None => Err(CacheError::NotFound(name.to_string())),
        }
    }

    // == Get Version ==
    /// Returns the current version for a config, or 0 if not cached.
    pub fn get_version(&self, name: &str) -> u64 {
        self.entries.get(name).map(|e| e.version).unwrap_or(0)
    }

    // == Has ==
    /// Checks if a config is currently cached.
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    // == Set ==
    /// Upserts a config document: full replacement, not a merge.
    ///
    /// Increments the version, marks the name dirty, and refreshes its
    /// access time. Returns the new version.
    pub fn set(&mut self, name: &str, data: Value) -> u64 {
        let new_version = self.get_version(name) + 1;
        self.entries
            .insert(name.to_string(), CacheEntry::new(data, new_version));
        self.dirty.insert(name.to_string());
        self.last_access
            .insert(name.to_string(), current_timestamp_ms());
        new_version
    }

    // == Set With Version ==
    /// Stores a config at a specific version without marking it dirty.
    ///
    /// Used when loading from disk: the value is already persisted.
    pub fn set_with_version(&mut self, name: &str, data: Value, version: u64) {
        self.entries
            .insert(name.to_string(), CacheEntry::new(data, version));
        self.last_access
            .insert(name.to_string(), current_timestamp_ms());
    }

    // == Set If Newer ==
    /// Applies a config only if the given version is strictly newer.
    ///
    /// Returns true if the value was applied (and marked dirty), false if
    /// it was rejected because the cached version is equal or newer.
    pub fn set_if_newer(&mut self, name: &str, data: Value, version: u64) -> bool {
        if version > self.get_version(name) {
            self.entries
                .insert(name.to_string(), CacheEntry::new(data, version));
            self.dirty.insert(name.to_string());
            self.last_access
                .insert(name.to_string(), current_timestamp_ms());
            true
        } else {
            false
        }
    }

    // == Mark Dirty ==
    /// Marks a cached config as needing a save.
    ///
    /// Marking an absent name is a no-op, reported via [`DirtyMark`] so
    /// callers that care can observe the miss.
    pub fn mark_dirty(&mut self, name: &str) -> DirtyMark {
        if self.entries.contains_key(name) {
            self.dirty.insert(name.to_string());
            DirtyMark::Marked
        } else {
            DirtyMark::NotCached
        }
    }

    // == Dirty Configs ==
    /// Returns the names of all dirty configs.
    pub fn dirty_configs(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    // == Clear Dirty ==
    /// Clears the dirty flag for a config (called after a successful save).
    pub fn clear_dirty(&mut self, name: &str) {
        self.dirty.remove(name);
    }

    // == Is Dirty ==
    /// Checks if a config is dirty.
    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    // == Evict ==
    /// Removes a config from the store entirely.
    ///
    /// Clears the entry, its dirty flag, its access time, and any
    /// invalidation flag. Idempotent.
    pub fn evict(&mut self, name: &str) {
        self.entries.remove(name);
        self.dirty.remove(name);
        self.last_access.remove(name);
        self.invalidated.remove(name);
    }

    // == Last Access Time ==
    /// Returns the last access timestamp for a config, if cached.
    pub fn last_access_time(&self, name: &str) -> Option<u64> {
        self.last_access.get(name).copied()
    }

    // == All Names ==
    /// Returns all cached config names.
    pub fn all_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Clear ==
    /// Wipes the entire store.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty.clear();
        self.last_access.clear();
        self.invalidated.clear();
    }

    // == Length ==
    /// Returns the current number of cached configs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Invalidate ==
    /// Flags a config as needing a reload on next host access.
    pub fn invalidate(&mut self, name: &str) {
        self.invalidated.insert(name.to_string());
    }

    // == Is Invalidated ==
    /// Checks if a config is flagged for reload.
    pub fn is_invalidated(&self, name: &str) -> bool {
        self.invalidated.contains(name)
    }

    // == Clear Invalidated ==
    /// Clears the reload flag for a config.
    pub fn clear_invalidated(&mut self, name: &str) {
        self.invalidated.remove(name);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_new() {
        let store = CacheStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new();

        store.set("app-settings", json!({"theme": "dark"}));
        let value = store.get("app-settings").unwrap();

        assert_eq!(value, json!({"theme": "dark"}));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = CacheStore::new();

        let result = store.get("nonexistent");
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_set_marks_dirty() {
        let mut store = CacheStore::new();

        store.set("plugin-config", json!({"enabled": true}));

        assert!(store.is_dirty("plugin-config"));
        assert_eq!(store.dirty_configs(), vec!["plugin-config".to_string()]);
    }

    #[test]
    fn test_store_set_refreshes_access_time() {
        let mut store = CacheStore::new();

        let before = current_timestamp_ms();
        store.set("a", json!(1));
        let access = store.last_access_time("a").unwrap();

        assert!(access >= before);
    }

    #[test]
    fn test_store_get_refreshes_access_time() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        let first = store.last_access_time("a").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.get("a").unwrap();
        let second = store.last_access_time("a").unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_store_overwrite_replaces_and_bumps_version() {
        let mut store = CacheStore::new();

        let v1 = store.set("a", json!({"x": 1}));
        let v2 = store.set("a", json!({"y": 2}));

        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        // Full replacement, not a merge
        assert_eq!(store.get("a").unwrap(), json!({"y": 2}));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_returns_clone() {
        let mut store = CacheStore::new();

        store.set("a", json!({"x": 1}));
        let mut value = store.get("a").unwrap();
        value["x"] = json!(99);

        assert_eq!(store.get("a").unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_store_set_with_version_not_dirty() {
        let mut store = CacheStore::new();

        store.set_with_version("loaded", json!({"from": "disk"}), 7);

        assert!(store.has("loaded"));
        assert!(!store.is_dirty("loaded"));
        assert_eq!(store.get_version("loaded"), 7);
        assert!(store.last_access_time("loaded").is_some());
    }

    #[test]
    fn test_store_set_if_newer() {
        let mut store = CacheStore::new();

        store.set_with_version("a", json!(1), 5);

        assert!(!store.set_if_newer("a", json!(2), 5));
        assert!(!store.set_if_newer("a", json!(2), 3));
        assert_eq!(store.get("a").unwrap(), json!(1));

        assert!(store.set_if_newer("a", json!(2), 6));
        assert_eq!(store.get("a").unwrap(), json!(2));
        assert!(store.is_dirty("a"));
    }

    #[test]
    fn test_store_mark_dirty_unknown_is_noop() {
        let mut store = CacheStore::new();

        assert_eq!(store.mark_dirty("ghost"), DirtyMark::NotCached);
        assert!(!store.is_dirty("ghost"));
    }

    #[test]
    fn test_store_mark_dirty_after_clear_dirty() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        store.clear_dirty("a");
        assert!(!store.is_dirty("a"));

        assert_eq!(store.mark_dirty("a"), DirtyMark::Marked);
        assert!(store.is_dirty("a"));
    }

    #[test]
    fn test_store_clear_dirty_keeps_entry() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        store.clear_dirty("a");

        assert!(store.has("a"));
        assert_eq!(store.get("a").unwrap(), json!(1));
    }

    #[test]
    fn test_store_evict_clears_all_maps() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        store.invalidate("a");
        store.evict("a");

        assert!(!store.has("a"));
        assert!(!store.is_dirty("a"));
        assert!(store.last_access_time("a").is_none());
        assert!(!store.is_invalidated("a"));
    }

    #[test]
    fn test_store_evict_idempotent() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        store.evict("a");
        store.evict("a");

        assert!(store.is_empty());
    }

    #[test]
    fn test_store_all_names() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        store.set("b", json!(2));

        let mut names = store.all_names();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_store_clear() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        store.set("b", json!(2));
        store.invalidate("b");
        store.clear();

        assert!(store.is_empty());
        assert!(store.dirty_configs().is_empty());
        assert!(store.last_access_time("a").is_none());
        assert!(!store.is_invalidated("b"));
    }

    #[test]
    fn test_store_get_with_version() {
        let mut store = CacheStore::new();

        store.set("a", json!({"x": 1}));
        store.set("a", json!({"x": 2}));

        let entry = store.get_with_version("a").unwrap();
        assert_eq!(entry.data, json!({"x": 2}));
        assert_eq!(entry.version, 2);
    }

    #[test]
    fn test_store_invalidation_flags() {
        let mut store = CacheStore::new();

        store.set("a", json!(1));
        assert!(!store.is_invalidated("a"));

        store.invalidate("a");
        assert!(store.is_invalidated("a"));

        store.clear_invalidated("a");
        assert!(!store.is_invalidated("a"));
    }
}
