use zenoh::key_expr::KeyExpr;
use zenoh::query::QueryTarget;

use crate::{msg::MsgSerde, ZrpcError, ZrpcTypeConfig};
use std::marker::PhantomData;
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ZrpcClient<C>
where
    C: ZrpcTypeConfig,
{
    key_expr: KeyExpr<'static>,
    z_session: zenoh::Session,
    timeout: Duration,
    _conf: PhantomData<C>,
}

impl<C> ZrpcClient<C>
where
    C: ZrpcTypeConfig,
{
    pub async fn new(
        service_id: String,
        z_session: zenoh::Session,
    ) -> Result<Self, ZrpcError<C::ErrInner>> {
        let key_expr = z_session
            .declare_keyexpr(service_id)
            .await
            .map_err(ZrpcError::ConnectionError)?;
        Ok(Self {
            key_expr,
            z_session,
            timeout: DEFAULT_TIMEOUT,
            _conf: PhantomData,
        })
    }

    /// Upper bound zenoh waits for the reply of a single call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn call(
        &self,
        payload: &<C::In as MsgSerde>::Data,
    ) -> Result<<C::Out as MsgSerde>::Data, ZrpcError<C::ErrInner>> {
        self.call_with_timeout(payload, self.timeout).await
    }

    /// Calls with a reply timeout of this call only. Running out of time is
    /// [`ZrpcError::Timeout`], whether zenoh closes the reply channel or
    /// answers with its own timeout error.
    pub async fn call_with_timeout(
        &self,
        payload: &<C::In as MsgSerde>::Data,
        timeout: Duration,
    ) -> Result<<C::Out as MsgSerde>::Data, ZrpcError<C::ErrInner>> {
        let payload = <C::In as MsgSerde>::to_zbyte(payload)
            .map_err(ZrpcError::EncodeError)?;
        let start = Instant::now();
        let replies = self
            .z_session
            .get(self.key_expr.clone())
            .target(QueryTarget::BestMatching)
            .payload(payload)
            .timeout(timeout)
            .await
            .map_err(ZrpcError::ConnectionError)?;
        let reply = match replies.recv_async().await {
            Ok(reply) => reply,
            Err(_) if start.elapsed() >= timeout => {
                return Err(ZrpcError::Timeout(timeout));
            }
            Err(_) => {
                return Err(ZrpcError::NoReply(self.key_expr.to_string()));
            }
        };
        match reply.result() {
            Ok(sample) => <C::Out as MsgSerde>::from_zbyte(sample.payload())
                .map_err(ZrpcError::DecodeError),
            Err(err) => match <C::Err as MsgSerde>::from_zbyte(err.payload()) {
                Ok(e) => Err(ZrpcError::ServerError(e)),
                // not sent by a service, zenoh's own reply to an expired query
                Err(_) if start.elapsed() >= timeout => {
                    Err(ZrpcError::Timeout(timeout))
                }
                Err(e) => Err(ZrpcError::DecodeError(e)),
            },
        }
    }
}
