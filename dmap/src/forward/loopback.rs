use std::sync::{Arc, Weak};
use std::time::Duration;

use anyerror::AnyError;
use scc::HashMap;

use crate::cluster::DMapNode;
use crate::error::{DMapError, ForwardError};
use crate::metadata::Member;
use crate::proto::{Request, Response};

use super::Forwarder;

/// In-process forwarder: hands requests straight to registered nodes.
/// An unregistered member behaves like an unreachable one.
#[derive(Default)]
pub struct LoopbackForwarder {
    nodes: HashMap<Member, Weak<DMapNode>>,
    delays: HashMap<Member, Duration>,
}

impl LoopbackForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node: &Arc<DMapNode>) {
        let member = node.this().clone();
        self.nodes.remove(&member);
        let _ = self.nodes.insert(member, Arc::downgrade(node));
    }

    pub fn unregister(&self, member: &Member) {
        self.nodes.remove(member);
    }

    /// Adds latency in front of every request sent to `member`.
    pub fn set_delay(&self, member: &Member, delay: Duration) {
        self.delays.remove(member);
        let _ = self.delays.insert(member.clone(), delay);
    }
}

#[async_trait::async_trait]
impl Forwarder for LoopbackForwarder {
    async fn forward(
        &self,
        owner: &Member,
        req: Request,
        _timeout: Duration,
    ) -> Result<Response, DMapError> {
        if let Some(delay) = self.delays.read(owner, |_, d| *d) {
            tokio::time::sleep(delay).await;
        }
        let node = self
            .nodes
            .read(owner, |_, n| n.upgrade())
            .flatten()
            .ok_or_else(|| {
                DMapError::forwarding(
                    owner,
                    ForwardError::Transport(AnyError::error(format!(
                        "{owner} is unreachable"
                    ))),
                )
            })?;
        node.handle(req).await
    }
}
