use std::time::Duration;

use anyerror::AnyError;
use dmap_zrpc::{ZrpcError, ZrpcServerError};
use tracing::warn;

use crate::error::{DMapError, ForwardError};
use crate::metadata::Member;
use crate::pool::ClientPool;
use crate::proto::{Request, Response};

use super::Forwarder;

/// Forwards over zenoh to the owner's key-value RPC.
pub struct ZrpcForwarder {
    pool: ClientPool,
}

impl ZrpcForwarder {
    pub fn new(pool: ClientPool) -> Self {
        ZrpcForwarder { pool }
    }
}

#[async_trait::async_trait]
impl Forwarder for ZrpcForwarder {
    async fn forward(
        &self,
        owner: &Member,
        req: Request,
        timeout: Duration,
    ) -> Result<Response, DMapError> {
        let client = self.pool.get(owner).await?;
        match client.call_with_timeout(&req, timeout).await {
            Ok(resp) => Ok(resp),
            Err(ZrpcError::ServerError(ZrpcServerError::AppError(e))) => Err(e),
            Err(ZrpcError::Timeout(d)) => {
                warn!("forward to {} got no reply within {:?}", owner, d);
                Err(DMapError::forwarding(owner, ForwardError::Timeout(d)))
            }
            Err(e) => {
                warn!("forward to {} failed: {}", owner, e);
                // rebuilt on the next call
                self.pool.remove(owner);
                Err(DMapError::forwarding(
                    owner,
                    ForwardError::Transport(AnyError::new(&e)),
                ))
            }
        }
    }
}
