mod loopback;
mod zrpc;

pub use loopback::LoopbackForwarder;
pub use zrpc::ZrpcForwarder;

use std::time::Duration;

use crate::error::DMapError;
use crate::metadata::Member;
use crate::proto::{Request, Response};

/// Sends a request to the node that owns it and hands back the owner's
/// outcome. Errors raised by the owner come back unchanged; failing to reach
/// the owner is a [`DMapError::Forwarding`]; running out of `timeout` is
/// [`ForwardError::Timeout`](crate::ForwardError::Timeout). Forwarders never
/// retry.
#[async_trait::async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        owner: &Member,
        req: Request,
        timeout: Duration,
    ) -> Result<Response, DMapError>;
}
