mod member;

pub use member::Member;

use scc::{HashMap, HashSet};
use tracing::info;

use crate::error::DMapError;
use crate::hkey::{HashKey, PartitionId};

pub const DEFAULT_PARTITION_COUNT: u64 = 271;

/// Answers "who owns this hash key right now". Implementations are fed by
/// whatever membership protocol runs the cluster; the router only reads.
pub trait OwnershipOracle: Send + Sync {
    fn owner_of(&self, hkey: HashKey) -> Result<Member, DMapError>;

    fn members(&self) -> Vec<Member>;

    fn partition_count(&self) -> u64;
}

/// Partition-to-owner table. Built from the same member list, every node
/// computes the same table.
pub struct PartitionTable {
    partition_count: u64,
    owners: HashMap<PartitionId, Member>,
    members: HashSet<Member>,
}

impl PartitionTable {
    pub fn new(partition_count: u64, members: Vec<Member>) -> Self {
        let table = PartitionTable {
            partition_count: partition_count.max(1),
            owners: HashMap::new(),
            members: HashSet::new(),
        };
        table.reassign(members);
        table
    }

    /// Replaces the member list and spreads the partitions over it
    /// round-robin in member order.
    pub fn reassign(&self, members: Vec<Member>) {
        let mut members = members;
        members.sort();
        members.dedup();
        info!(
            "assign {} partitions to {} members",
            self.partition_count,
            members.len()
        );
        self.members.clear();
        for m in &members {
            let _ = self.members.insert(m.clone());
        }
        if members.is_empty() {
            self.owners.clear();
            return;
        }
        for partition in 0..self.partition_count {
            let owner = members[(partition % members.len() as u64) as usize].clone();
            self.set_owner(partition, owner);
        }
    }

    /// Moves a single partition to `member`.
    pub fn set_owner(&self, partition: PartitionId, member: Member) {
        let _ = self.members.insert(member.clone());
        match self.owners.entry(partition) {
            scc::hash_map::Entry::Occupied(mut o) => {
                *o.get_mut() = member;
            }
            scc::hash_map::Entry::Vacant(v) => {
                v.insert_entry(member);
            }
        }
    }

    pub fn partition_of(&self, hkey: HashKey) -> PartitionId {
        hkey.partition(self.partition_count)
    }
}

impl OwnershipOracle for PartitionTable {
    fn owner_of(&self, hkey: HashKey) -> Result<Member, DMapError> {
        let partition = self.partition_of(hkey);
        self.owners
            .read(&partition, |_, m| m.clone())
            .ok_or_else(|| {
                DMapError::Internal(format!(
                    "no owner for partition {partition}"
                ))
            })
    }

    fn members(&self) -> Vec<Member> {
        let mut out = Vec::with_capacity(self.members.len());
        self.members.scan(|m| out.push(m.clone()));
        out.sort();
        out
    }

    fn partition_count(&self) -> u64 {
        self.partition_count
    }
}
