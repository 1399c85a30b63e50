mod manager;
mod store;

pub use manager::PartitionManager;
pub use store::{Entry, PartitionStore};

use std::sync::Arc;

use scc::HashMap;
use tracing::debug;

use crate::hkey::PartitionId;

/// All map stores a node holds for one partition.
pub struct Partition {
    pub id: PartitionId,
    maps: HashMap<String, Arc<PartitionStore>>,
}

impl Partition {
    pub fn new(id: PartitionId) -> Self {
        Partition {
            id,
            maps: HashMap::new(),
        }
    }

    #[inline]
    pub fn store(&self, name: &str) -> Option<Arc<PartitionStore>> {
        self.maps.read(name, |_, s| s.clone())
    }

    /// Maps come into existence on their first write.
    pub fn store_or_create(&self, name: &str) -> Arc<PartitionStore> {
        if let Some(store) = self.store(name) {
            return store;
        }
        self.maps
            .entry(name.to_owned())
            .or_insert_with(|| {
                debug!("create store '{}' in partition {}", name, self.id);
                Arc::new(PartitionStore::new())
            })
            .get()
            .clone()
    }

    pub fn remove(&self, name: &str) -> bool {
        self.maps.remove(name).is_some()
    }

    pub fn stores(&self) -> Vec<Arc<PartitionStore>> {
        let mut out = Vec::new();
        self.maps.scan(|_, s| out.push(s.clone()));
        out
    }
}
