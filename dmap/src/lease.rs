//! Per-key leases.
//!
//! A lease is `Locked(expires_at)` while present in the table and
//! `Unlocked` otherwise. Expiry is evaluated on access; nothing needs a
//! timer. The table does not record who holds a lease, so any caller can
//! release any lease.

use std::time::Duration;

use scc::hash_map::Entry;
use scc::HashMap;
use tokio::time::Instant;
use tracing::trace;

use crate::error::DMapError;
use crate::hkey::HashKey;

type LeaseKey = (String, HashKey);

pub struct LeaseManager {
    shards: Vec<HashMap<LeaseKey, Instant>>,
}

impl LeaseManager {
    pub fn new(partition_count: u64) -> Self {
        let shards = (0..partition_count.max(1)).map(|_| HashMap::new()).collect();
        LeaseManager { shards }
    }

    #[inline]
    fn shard(&self, hkey: HashKey) -> &HashMap<LeaseKey, Instant> {
        &self.shards[hkey.partition(self.shards.len() as u64) as usize]
    }

    /// Takes the lease for `ttl` if nobody holds a live one. Never waits.
    pub fn lock_with_timeout(
        &self,
        name: &str,
        hkey: HashKey,
        ttl: Duration,
    ) -> Result<(), DMapError> {
        let now = Instant::now();
        match self.shard(hkey).entry((name.to_owned(), hkey)) {
            Entry::Occupied(mut o) => {
                if *o.get() > now {
                    return Err(DMapError::AlreadyLocked);
                }
                *o.get_mut() = now + ttl;
            }
            Entry::Vacant(v) => {
                v.insert_entry(now + ttl);
            }
        }
        trace!("lock '{}'/{} for {:?}", name, hkey, ttl);
        Ok(())
    }

    /// Releases the lease, live or expired.
    pub fn unlock(&self, name: &str, hkey: HashKey) -> Result<(), DMapError> {
        self.shard(hkey)
            .remove(&(name.to_owned(), hkey))
            .map(|_| trace!("unlock '{}'/{}", name, hkey))
            .ok_or(DMapError::NoSuchLock)
    }

    pub fn is_locked(&self, name: &str, hkey: HashKey) -> bool {
        let now = Instant::now();
        self.shard(hkey)
            .read(&(name.to_owned(), hkey), |_, at| *at > now)
            .unwrap_or(false)
    }

    /// Drops expired leases and returns how many were dropped.
    pub fn reclaim(&self, now: Instant) -> usize {
        let mut reclaimed = 0;
        for shard in &self.shards {
            shard.retain(|_, at| {
                let expired = *at <= now;
                if expired {
                    reclaimed += 1;
                }
                !expired
            });
        }
        reclaimed
    }
}
