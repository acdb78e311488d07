use crate::{
    cache::{CacheAdapter, CacheEntry},
    codec::KeyCodec,
    error::InternalError,
    query::QueryDescriptor,
};
use std::collections::{BTreeMap, BTreeSet};

///
/// MemoryCache
///
/// In-process `CacheAdapter`. Invalidated entries stay readable through
/// [`Self::get`] but are no longer offered to the engine by `scan`.
///

#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entries: BTreeMap<String, CacheEntry>,
    invalidated: BTreeSet<String>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry under a raw key, clearing any stale mark.
    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        self.invalidated.remove(&key);
        self.entries.insert(key, entry);
    }

    /// Store the result of `descriptor` under its encoded key and return the key.
    pub fn insert_query(
        &mut self,
        codec: &KeyCodec,
        descriptor: &QueryDescriptor,
        entry: CacheEntry,
    ) -> String {
        let key = codec.encode(descriptor);
        self.insert(key.clone(), entry);

        key
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.invalidated.remove(key);
        self.entries.remove(key)
    }

    #[must_use]
    pub fn is_invalidated(&self, key: &str) -> bool {
        self.invalidated.contains(key)
    }

    pub fn invalidated_keys(&self) -> impl Iterator<Item = &str> {
        self.invalidated.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheAdapter for MemoryCache {
    fn scan(&self, _table: &str) -> Result<Vec<(String, CacheEntry)>, InternalError> {
        Ok(self
            .entries
            .iter()
            .filter(|(key, _)| !self.invalidated.contains(*key))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect())
    }

    fn commit(&mut self, key: &str, entry: CacheEntry) -> Result<(), InternalError> {
        let slot = self
            .entries
            .get_mut(key)
            .ok_or_else(|| InternalError::cache_not_found(key))?;
        *slot = entry;
        self.invalidated.remove(key);

        Ok(())
    }

    fn invalidate(&mut self, key: &str) -> Result<(), InternalError> {
        if !self.entries.contains_key(key) {
            return Err(InternalError::cache_not_found(key));
        }
        self.invalidated.insert(key.to_string());

        Ok(())
    }
}
