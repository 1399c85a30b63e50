use dmap_zrpc::ZrpcClient;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::{DMapError, ForwardError},
    metadata::Member,
    proto::{kv_key_expr, KvTypeConfig},
};

pub type KvClient = ZrpcClient<KvTypeConfig>;

/// One lazily created RPC client per member.
#[derive(Clone)]
pub struct ClientPool {
    clients: Arc<scc::HashMap<Member, Arc<KvClient>>>,
    z_session: zenoh::Session,
    prefix: String,
}

impl ClientPool {
    pub fn new(z_session: zenoh::Session, prefix: String) -> Self {
        ClientPool {
            clients: Arc::new(scc::HashMap::new()),
            z_session,
            prefix,
        }
    }

    pub async fn get(&self, member: &Member) -> Result<Arc<KvClient>, DMapError> {
        if let Some(c) = self.clients.read_async(member, |_, c| c.clone()).await {
            return Ok(c);
        }
        let key_expr = kv_key_expr(&self.prefix, member);
        debug!("create client for '{}'", key_expr);
        let client = KvClient::new(key_expr, self.z_session.clone())
            .await
            .map_err(|e| {
                DMapError::forwarding(
                    member,
                    ForwardError::Transport(anyerror::AnyError::new(&e)),
                )
            })?;
        let client = self
            .clients
            .entry_async(member.clone())
            .await
            .or_insert(Arc::new(client))
            .get()
            .clone();
        Ok(client)
    }

    pub fn remove(&self, member: &Member) {
        if self.clients.remove(member).is_some() {
            debug!("drop client for {}", member);
        }
    }
}
