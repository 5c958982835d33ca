use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::models::FilterReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupEntry {
    Seen,
    Filtered(FilterReason),
}

/// Backing store for dedup state. Implementations must make each `mark_*`
/// an atomic insert-if-absent so only one caller can ever claim a key.
pub trait DedupStore: Send + Sync {
    fn has_seen(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns `true` if this call recorded the key, `false` if it was already known.
    fn mark_seen(&self, key: &str) -> Result<bool, StoreError>;

    fn is_filtered(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns `true` if this call recorded the key, `false` if it was already known.
    fn mark_filtered(&self, key: &str, reason: FilterReason) -> Result<bool, StoreError>;

    /// Drop every filtered entry, keeping seen ones. All or nothing.
    /// Returns how many entries were removed.
    fn clear_filtered(&self) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    entries: RwLock<HashMap<String, DedupEntry>>,
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("dedup store lock poisoned".to_string())
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &str) -> Result<Option<DedupEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).copied())
    }

    fn insert_if_absent(&self, key: &str, entry: DedupEntry) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), entry);
        Ok(true)
    }
}

impl DedupStore for MemoryDedupStore {
    fn has_seen(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entry(key)? == Some(DedupEntry::Seen))
    }

    fn mark_seen(&self, key: &str) -> Result<bool, StoreError> {
        self.insert_if_absent(key, DedupEntry::Seen)
    }

    fn is_filtered(&self, key: &str) -> Result<bool, StoreError> {
        Ok(matches!(self.entry(key)?, Some(DedupEntry::Filtered(_))))
    }

    fn mark_filtered(&self, key: &str, reason: FilterReason) -> Result<bool, StoreError> {
        self.insert_if_absent(key, DedupEntry::Filtered(reason))
    }

    fn clear_filtered(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, entry| *entry == DedupEntry::Seen);
        Ok(before - entries.len())
    }
}

/// Reads through to `base` but keeps every write in memory. Used for dry runs.
pub struct OverlayDedupStore<'a> {
    base: &'a dyn DedupStore,
    local: MemoryDedupStore,
}

impl<'a> OverlayDedupStore<'a> {
    pub fn new(base: &'a dyn DedupStore) -> Self {
        Self {
            base,
            local: MemoryDedupStore::new(),
        }
    }

    fn known(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.local.entry(key)?.is_some() || self.base.has_seen(key)? || self.base.is_filtered(key)?)
    }
}

impl DedupStore for OverlayDedupStore<'_> {
    fn has_seen(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.local.has_seen(key)? || self.base.has_seen(key)?)
    }

    fn mark_seen(&self, key: &str) -> Result<bool, StoreError> {
        if self.known(key)? {
            return Ok(false);
        }
        self.local.mark_seen(key)
    }

    fn is_filtered(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.local.is_filtered(key)? || self.base.is_filtered(key)?)
    }

    fn mark_filtered(&self, key: &str, reason: FilterReason) -> Result<bool, StoreError> {
        if self.known(key)? {
            return Ok(false);
        }
        self.local.mark_filtered(key, reason)
    }

    fn clear_filtered(&self) -> Result<usize, StoreError> {
        self.local.clear_filtered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_overlay_never_writes_through() {
        let base = MemoryDedupStore::new();
        base.mark_seen("old").unwrap();

        let overlay = OverlayDedupStore::new(&base);
        assert!(overlay.has_seen("old").unwrap());
        assert!(!overlay.mark_seen("old").unwrap());
        assert!(overlay.mark_filtered("new", FilterReason::SeasonYearMismatch).unwrap());
        assert!(overlay.is_filtered("new").unwrap());

        assert_eq!(base.entry("new").unwrap(), None);
    }

    #[test]
    fn test_mark_and_check() {
        let store = MemoryDedupStore::new();
        assert!(!store.has_seen("a").unwrap());
        assert!(store.mark_seen("a").unwrap());
        assert!(store.has_seen("a").unwrap());
        assert!(!store.is_filtered("a").unwrap());
        assert!(!store.mark_seen("a").unwrap());
    }

    #[test]
    fn test_filtered_key_cannot_be_claimed_as_seen() {
        let store = MemoryDedupStore::new();
        assert!(store.mark_filtered("b", FilterReason::SeasonYearMismatch).unwrap());
        assert!(store.is_filtered("b").unwrap());
        assert!(!store.mark_seen("b").unwrap());
        assert_eq!(
            store.entry("b").unwrap(),
            Some(DedupEntry::Filtered(FilterReason::SeasonYearMismatch))
        );
    }

    #[test]
    fn test_clear_filtered_keeps_seen() {
        let store = MemoryDedupStore::new();
        store.mark_seen("accepted").unwrap();
        store.mark_filtered("rejected-1", FilterReason::ClassStandingMismatch).unwrap();
        store.mark_filtered("rejected-2", FilterReason::WorkAuthorizationMismatch).unwrap();

        assert_eq!(store.clear_filtered().unwrap(), 2);
        assert!(store.has_seen("accepted").unwrap());
        assert!(!store.is_filtered("rejected-1").unwrap());
        assert_eq!(store.entry("rejected-2").unwrap(), None);
        assert_eq!(store.clear_filtered().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_mark_seen_claims_once() {
        let store = MemoryDedupStore::new();
        let claimed: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| store.mark_seen("https://example.com/job").unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });
        assert_eq!(claimed, 1);
    }
}
