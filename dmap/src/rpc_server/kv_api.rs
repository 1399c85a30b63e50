use std::sync::Arc;

use dmap_zrpc::{ZrpcService, ZrpcServiceHander};
use tracing::info;

use crate::cluster::DMapNode;
use crate::error::DMapError;
use crate::proto::{kv_key_expr, KvTypeConfig, Request, Response};

pub type KvService = ZrpcService<KvHandler, KvTypeConfig>;

pub struct KvHandler {
    node: Arc<DMapNode>,
}

impl KvHandler {
    pub fn new(node: Arc<DMapNode>) -> KvHandler {
        KvHandler { node }
    }
}

#[async_trait::async_trait]
impl ZrpcServiceHander for KvHandler {
    type In = Request;

    type Out = Response;

    type Err = DMapError;

    async fn handle(&self, req: Request) -> Result<Response, DMapError> {
        self.node.handle(req).await
    }
}

/// Serves the node's key-value RPC on its own key expression under
/// `prefix`.
pub async fn serve(
    node: Arc<DMapNode>,
    z_session: zenoh::Session,
    prefix: &str,
) -> Result<KvService, DMapError> {
    let key_expr = kv_key_expr(prefix, node.this());
    info!("serve kv of {} on '{}'", node.this(), key_expr);
    KvService::new(key_expr, z_session, KvHandler::new(node))
        .start()
        .await
        .map_err(|e| DMapError::Internal(format!("cannot start kv service: {e}")))
}
