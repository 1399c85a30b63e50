use std::time::Duration;

use bytes::Bytes;
use scc::hash_map::Entry as MapEntry;
use scc::HashMap;
use tokio::time::Instant;

use crate::error::DMapError;
use crate::hkey::HashKey;

#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Bytes,
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// `ttl` of `None` or zero keeps the entry until it is deleted.
    pub fn new(value: Bytes, ttl: Option<Duration>, now: Instant) -> Self {
        let expires_at = ttl.filter(|d| !d.is_zero()).map(|d| now + d);
        Entry { value, expires_at }
    }

    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Entries of one map inside one partition.
#[derive(Default)]
pub struct PartitionStore {
    entries: HashMap<HashKey, Entry>,
}

impl PartitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hkey: HashKey) -> Result<Bytes, DMapError> {
        let now = Instant::now();
        let found = self.entries.read(&hkey, |_, e| {
            if e.is_expired(now) {
                None
            } else {
                Some(e.value.clone())
            }
        });
        match found {
            Some(Some(value)) => Ok(value),
            Some(None) => {
                self.entries.remove_if(&hkey, |e| e.is_expired(now));
                Err(DMapError::KeyNotFound)
            }
            None => Err(DMapError::KeyNotFound),
        }
    }

    pub fn put(&self, hkey: HashKey, value: Bytes, ttl: Option<Duration>) {
        let entry = Entry::new(value, ttl, Instant::now());
        match self.entries.entry(hkey) {
            MapEntry::Occupied(mut o) => {
                *o.get_mut() = entry;
            }
            MapEntry::Vacant(v) => {
                v.insert_entry(entry);
            }
        }
    }

    /// Removing an absent key is not an error.
    pub fn delete(&self, hkey: HashKey) {
        self.entries.remove(&hkey);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut count = 0;
        self.entries.scan(|_, e| {
            if !e.is_expired(now) {
                count += 1;
            }
        });
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries and returns how many were dropped.
    pub fn reclaim(&self, now: Instant) -> usize {
        let mut reclaimed = 0;
        self.entries.retain(|_, e| {
            let expired = e.is_expired(now);
            if expired {
                reclaimed += 1;
            }
            !expired
        });
        reclaimed
    }
}
