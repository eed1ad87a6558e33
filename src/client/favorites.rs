// src/client/favorites.rs
use crate::client::storage::{KeyValueStore, StorageError};
use crate::models::place::Place;
use std::sync::Arc;

pub const FAVORITES_KEY: &str = "halal-map:favorites";
pub const GUEST_QUERIES_KEY: &str = "halal-map:guest-queries-used";
/// Anonymous chat queries allowed before sign-in is required
pub const GUEST_QUERY_LIMIT: u32 = 3;

/// Favorited place ids, persisted as a JSON array. Order of insertion is
/// kept and ids never repeat.
pub struct FavoritesStore {
    storage: Arc<dyn KeyValueStore>,
    ids: Vec<i64>,
}

impl FavoritesStore {
    /// Reads the persisted list. Unreadable data starts an empty list.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let ids = match storage.get(FAVORITES_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<i64>>(&raw) {
                Ok(mut ids) => {
                    let mut seen = std::collections::HashSet::new();
                    ids.retain(|id| seen.insert(*id));
                    ids
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable favorites: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read favorites: {}", e);
                Vec::new()
            }
        };

        Self { storage, ids }
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Returns false when the id was already a favorite. On a storage
    /// error the in-memory list is left unchanged.
    pub fn add(&mut self, id: i64) -> Result<bool, StorageError> {
        if self.contains(id) {
            return Ok(false);
        }
        let mut ids = self.ids.clone();
        ids.push(id);
        self.commit(ids)?;
        Ok(true)
    }

    /// Returns false when the id was not a favorite
    pub fn remove(&mut self, id: i64) -> Result<bool, StorageError> {
        if !self.contains(id) {
            return Ok(false);
        }
        let ids = self.ids.iter().copied().filter(|existing| *existing != id).collect();
        self.commit(ids)?;
        Ok(true)
    }

    /// Returns whether the id is a favorite afterwards
    pub fn toggle(&mut self, id: i64) -> Result<bool, StorageError> {
        if self.contains(id) {
            self.remove(id)?;
            Ok(false)
        } else {
            self.add(id)?;
            Ok(true)
        }
    }

    pub fn retain_favorites(&self, places: Vec<Place>) -> Vec<Place> {
        places.into_iter().filter(|p| self.contains(p.id)).collect()
    }

    /// Persists `ids`, then adopts them
    fn commit(&mut self, ids: Vec<i64>) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&ids)?;
        self.storage.set(FAVORITES_KEY, &raw)?;
        self.ids = ids;
        Ok(())
    }
}

/// Counter of anonymous chat queries
pub struct GuestQuota {
    storage: Arc<dyn KeyValueStore>,
    used: u32,
    limit: u32,
}

impl GuestQuota {
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_limit(storage, GUEST_QUERY_LIMIT)
    }

    pub fn with_limit(storage: Arc<dyn KeyValueStore>, limit: u32) -> Self {
        let used = storage
            .get(GUEST_QUERIES_KEY)
            .ok()
            .flatten()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(0);

        Self {
            storage,
            used,
            limit,
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn can_query(&self) -> bool {
        self.used < self.limit
    }

    /// The in-memory count advances even when persisting it fails, so the
    /// gate still holds for the rest of the session.
    pub fn increment_used(&mut self) -> Result<u32, StorageError> {
        self.used = self.used.saturating_add(1).min(self.limit);
        self.storage.set(GUEST_QUERIES_KEY, &self.used.to_string())?;
        Ok(self.used)
    }

    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.used = 0;
        self.storage.remove(GUEST_QUERIES_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::MemoryKeyValueStore;
    use crate::models::place::sample_place;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn storage() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryKeyValueStore::new())
    }

    /// Memory store whose writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryKeyValueStore,
        read_only: AtomicBool,
    }

    impl FlakyStore {
        fn check_writable(&self) -> Result<(), StorageError> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            Ok(())
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.check_writable()?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.check_writable()?;
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_toggle_then_reload() {
        let storage = storage();
        let mut favorites = FavoritesStore::load(storage.clone());
        assert!(favorites.toggle(42).unwrap());

        let reloaded = FavoritesStore::load(storage.clone());
        assert_eq!(reloaded.ids(), &[42]);

        let mut favorites = reloaded;
        assert!(!favorites.toggle(42).unwrap());
        assert!(FavoritesStore::load(storage).ids().is_empty());
    }

    #[test]
    fn test_repeated_add_has_no_duplicates() {
        let storage = storage();
        let mut favorites = FavoritesStore::load(storage.clone());
        assert!(favorites.add(7).unwrap());
        assert!(!favorites.add(7).unwrap());
        assert!(favorites.add(9).unwrap());
        assert!(!favorites.remove(100).unwrap());

        assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[7,9]"));
    }

    #[test]
    fn test_failed_write_leaves_favorites_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let mut favorites = FavoritesStore::load(store.clone());
        favorites.add(1).unwrap();

        store.read_only.store(true, Ordering::SeqCst);
        assert!(favorites.add(2).is_err());
        assert_eq!(favorites.ids(), &[1]);
        assert!(!favorites.contains(2));

        assert!(favorites.remove(1).is_err());
        assert!(favorites.contains(1));
        assert!(favorites.toggle(1).is_err());
        assert!(favorites.contains(1));

        // Memory and storage still agree
        store.read_only.store(false, Ordering::SeqCst);
        assert_eq!(FavoritesStore::load(store).ids(), favorites.ids());
    }

    #[test]
    fn test_corrupt_favorites_start_empty() {
        let storage = storage();
        storage.set(FAVORITES_KEY, "not json").unwrap();
        assert!(FavoritesStore::load(storage.clone()).ids().is_empty());

        storage.set(FAVORITES_KEY, "[3,3,4]").unwrap();
        assert_eq!(FavoritesStore::load(storage).ids(), &[3, 4]);
    }

    #[test]
    fn test_retain_favorites() {
        let mut favorites = FavoritesStore::load(storage());
        favorites.add(2).unwrap();
        let kept = favorites.retain_favorites(vec![sample_place(1, "a"), sample_place(2, "b")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }

    #[test]
    fn test_guest_quota() {
        let storage = storage();
        let mut quota = GuestQuota::load(storage.clone());
        assert_eq!(quota.remaining(), GUEST_QUERY_LIMIT);

        for _ in 0..GUEST_QUERY_LIMIT + 2 {
            quota.increment_used().unwrap();
        }
        assert!(!quota.can_query());
        assert_eq!(quota.used(), GUEST_QUERY_LIMIT);

        // Survives a reload
        assert!(!GuestQuota::load(storage.clone()).can_query());

        quota.reset().unwrap();
        assert!(GuestQuota::load(storage).can_query());
    }

    #[test]
    fn test_guest_quota_holds_when_storage_fails() {
        let store = Arc::new(FlakyStore::default());
        store.read_only.store(true, Ordering::SeqCst);
        let mut quota = GuestQuota::with_limit(store, 1);

        assert!(quota.increment_used().is_err());
        assert!(!quota.can_query());
    }
}
