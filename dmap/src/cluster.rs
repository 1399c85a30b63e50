use crate::codec::Codec;
use crate::dmap::DMap;
use crate::error::{DMapError, ForwardError};
use crate::forward::Forwarder;
use crate::hkey::{self, HashKey};
use crate::lease::LeaseManager;
use crate::metadata::{Member, OwnershipOracle, DEFAULT_PARTITION_COUNT};
use crate::partition::PartitionManager;
use crate::proto::{KeyRequest, Operation, Request, Response};
use crate::util::parse_duration;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub this: Member,
    pub partition_count: u64,
    /// Forwarding depth after which a request is rejected instead of
    /// forwarded again.
    pub max_hops: u8,
    /// Deadline of a forwarded call when the caller sets none.
    pub request_timeout: Duration,
}

impl NodeConfig {
    pub fn new(this: Member) -> Self {
        NodeConfig {
            this,
            partition_count: DEFAULT_PARTITION_COUNT,
            max_hops: 3,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// A cluster member: routes every operation to the owner of its key and
/// serves the keys it owns.
pub struct DMapNode {
    config: NodeConfig,
    oracle: Arc<dyn OwnershipOracle>,
    partitions: PartitionManager,
    leases: LeaseManager,
    forwarder: Arc<dyn Forwarder>,
    codec: Codec,
    close_signal_sender: tokio::sync::watch::Sender<bool>,
    close_signal_receiver: tokio::sync::watch::Receiver<bool>,
}

impl DMapNode {
    pub fn new(
        config: NodeConfig,
        oracle: Arc<dyn OwnershipOracle>,
        forwarder: Arc<dyn Forwarder>,
        codec: Codec,
    ) -> Self {
        if oracle.partition_count() != config.partition_count {
            warn!(
                "oracle has {} partitions, node configured with {}",
                oracle.partition_count(),
                config.partition_count
            );
        }
        let (tx, rx) = tokio::sync::watch::channel(false);
        DMapNode {
            partitions: PartitionManager::new(config.partition_count),
            leases: LeaseManager::new(config.partition_count),
            config,
            oracle,
            forwarder,
            codec,
            close_signal_sender: tx,
            close_signal_receiver: rx,
        }
    }

    #[inline]
    pub fn this(&self) -> &Member {
        &self.config.this
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn partitions(&self) -> &PartitionManager {
        &self.partitions
    }

    pub fn leases(&self) -> &LeaseManager {
        &self.leases
    }

    /// Typed handle on the map `name`.
    pub fn dmap(self: &Arc<Self>, name: &str) -> DMap {
        DMap::new(self.clone(), name.to_owned())
    }

    /// Runs `op` on `key` of map `map_name`, wherever the key lives.
    pub async fn execute(
        &self,
        map_name: &str,
        key: &str,
        op: Operation,
        deadline: Option<Duration>,
    ) -> Result<Response, DMapError> {
        let hkey = hkey::derive(map_name, key);
        self.route(
            KeyRequest {
                map_name: map_name.to_owned(),
                hkey,
                hash_version: hkey::HASH_VERSION,
                op,
                hops: 0,
            },
            deadline,
        )
        .await
    }

    /// Entry point for requests arriving from other nodes.
    pub async fn handle(&self, req: Request) -> Result<Response, DMapError> {
        match req {
            Request::Key(req) if req.hash_version != hkey::HASH_VERSION => {
                warn!(
                    "reject '{}'/{} hashed with version {}",
                    req.map_name, req.hkey, req.hash_version
                );
                Err(DMapError::HashVersionMismatch {
                    expected: hkey::HASH_VERSION,
                    found: req.hash_version,
                })
            }
            Request::Key(req) => self.route(req, None).await,
            Request::Destroy { map_name } => {
                self.partitions.destroy(&map_name);
                Ok(Response::Empty)
            }
        }
    }

    /// Drops the map on this node, then on every other member. All members
    /// are tried; the first failure is returned.
    pub async fn destroy(
        &self,
        map_name: &str,
        deadline: Option<Duration>,
    ) -> Result<(), DMapError> {
        self.partitions.destroy(map_name);
        let mut first_err = None;
        for member in self.oracle.members() {
            if member == *self.this() {
                continue;
            }
            let req = Request::Destroy {
                map_name: map_name.to_owned(),
            };
            if let Err(e) = self.send(&member, req, deadline).await {
                warn!("destroy '{}' on {} failed: {}", map_name, member, e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn route(
        &self,
        req: KeyRequest,
        deadline: Option<Duration>,
    ) -> Result<Response, DMapError> {
        let owner = self.oracle.owner_of(req.hkey)?;
        if owner == *self.this() {
            return self.execute_local(&req.map_name, req.hkey, req.op);
        }
        if req.hops >= self.config.max_hops {
            warn!(
                "drop {} '{}'/{} after {} hops, owner {}",
                req.op.name(),
                req.map_name,
                req.hkey,
                req.hops,
                owner
            );
            return Err(DMapError::forwarding(
                &owner,
                ForwardError::HopLimit(req.hops),
            ));
        }
        debug!(
            "forward {} '{}'/{} to {}",
            req.op.name(),
            req.map_name,
            req.hkey,
            owner
        );
        let req = KeyRequest {
            hops: req.hops + 1,
            ..req
        };
        self.send(&owner, Request::Key(req), deadline).await
    }

    async fn send(
        &self,
        owner: &Member,
        req: Request,
        deadline: Option<Duration>,
    ) -> Result<Response, DMapError> {
        let deadline = deadline.unwrap_or(self.config.request_timeout);
        let forward = self.forwarder.forward(owner, req, deadline);
        match tokio::time::timeout(deadline, forward).await {
            Ok(out) => out,
            Err(_) => Err(DMapError::forwarding(
                owner,
                ForwardError::Timeout(deadline),
            )),
        }
    }

    fn execute_local(
        &self,
        map_name: &str,
        hkey: HashKey,
        op: Operation,
    ) -> Result<Response, DMapError> {
        match op {
            Operation::Get => {
                self.partitions.get(map_name, hkey).map(Response::Value)
            }
            Operation::Put { value, timeout } => {
                let ttl = timeout.as_deref().map(parse_duration).transpose()?;
                self.codec.inspect(&value)?;
                self.partitions.put(map_name, hkey, value, ttl);
                Ok(Response::Empty)
            }
            Operation::Delete => {
                self.partitions.delete(map_name, hkey);
                Ok(Response::Empty)
            }
            Operation::LockWithTimeout { timeout } => {
                let ttl = parse_duration(&timeout)?;
                self.leases.lock_with_timeout(map_name, hkey, ttl)?;
                Ok(Response::Empty)
            }
            Operation::Unlock => {
                self.leases.unlock(map_name, hkey)?;
                Ok(Response::Empty)
            }
        }
    }

    /// Sweeps expired entries and leases every `interval` until
    /// [`close`](Self::close) is called. A zero interval disables the sweep;
    /// expired data is then only dropped when it is read.
    pub fn start_reclaimer(
        self: Arc<Self>,
        interval: Duration,
    ) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            info!("reclaim loop disabled on {}", self.this());
            return None;
        }
        let mut close_signal = self.close_signal_receiver.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let entries = self.partitions.reclaim(now);
                        let leases = self.leases.reclaim(now);
                        if entries + leases > 0 {
                            debug!("reclaimed {} entries, {} leases", entries, leases);
                        }
                    }
                    changed = close_signal.changed() => {
                        if changed.is_err() || *close_signal.borrow() {
                            info!("closed reclaim loop");
                            break;
                        }
                    }
                }
            }
        });
        Some(task)
    }

    pub fn close(&self) {
        info!("close node {}", self.this());
        let _ = self.close_signal_sender.send(true);
    }
}
