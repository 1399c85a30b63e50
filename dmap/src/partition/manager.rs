use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::debug;

use crate::error::DMapError;
use crate::hkey::HashKey;

use super::Partition;

/// The partition stores held by one node, one [`Partition`] per partition id.
pub struct PartitionManager {
    partitions: Vec<Partition>,
}

impl PartitionManager {
    pub fn new(partition_count: u64) -> Self {
        let partitions = (0..partition_count.max(1)).map(Partition::new).collect();
        Self { partitions }
    }

    pub fn partition_count(&self) -> u64 {
        self.partitions.len() as u64
    }

    #[inline]
    pub fn partition(&self, hkey: HashKey) -> &Partition {
        &self.partitions[hkey.partition(self.partition_count()) as usize]
    }

    pub fn get(&self, name: &str, hkey: HashKey) -> Result<Bytes, DMapError> {
        match self.partition(hkey).store(name) {
            Some(store) => store.get(hkey),
            None => Err(DMapError::KeyNotFound),
        }
    }

    pub fn put(
        &self,
        name: &str,
        hkey: HashKey,
        value: Bytes,
        ttl: Option<Duration>,
    ) {
        self.partition(hkey).store_or_create(name).put(hkey, value, ttl);
    }

    pub fn delete(&self, name: &str, hkey: HashKey) {
        if let Some(store) = self.partition(hkey).store(name) {
            store.delete(hkey);
        }
    }

    /// Drops every local entry of `name`. Returns how many partitions held
    /// part of the map.
    pub fn destroy(&self, name: &str) -> usize {
        let removed = self.partitions.iter().filter(|p| p.remove(name)).count();
        debug!("destroy map '{}' in {} partitions", name, removed);
        removed
    }

    /// Number of live entries of `name` held on this node.
    pub fn len(&self, name: &str) -> usize {
        self.partitions
            .iter()
            .filter_map(|p| p.store(name))
            .map(|s| s.len())
            .sum()
    }

    pub fn reclaim(&self, now: Instant) -> usize {
        self.partitions
            .iter()
            .flat_map(|p| p.stores())
            .map(|s| s.reclaim(now))
            .sum()
    }
}
