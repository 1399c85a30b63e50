use std::{marker::PhantomData, sync::Arc};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use zenoh::query::Query;

use crate::{msg::MsgSerde, ZrpcError, ZrpcServerError, ZrpcTypeConfig};

#[async_trait::async_trait]
pub trait ZrpcServiceHander {
    type In;
    type Out;
    type Err;

    async fn handle(&self, req: Self::In) -> Result<Self::Out, Self::Err>;
}

pub struct ZrpcService<T, C>
where
    C: ZrpcTypeConfig,
    T: ZrpcServiceHander<
            In = <C::In as MsgSerde>::Data,
            Out = <C::Out as MsgSerde>::Data,
            Err = C::ErrInner,
        > + Send
        + Sync
        + 'static,
{
    service_id: String,
    z_session: zenoh::Session,
    handler: Arc<T>,
    task: Option<JoinHandle<()>>,
    _conf: PhantomData<C>,
}

impl<T, C> ZrpcService<T, C>
where
    C: ZrpcTypeConfig,
    T: ZrpcServiceHander<
            In = <C::In as MsgSerde>::Data,
            Out = <C::Out as MsgSerde>::Data,
            Err = C::ErrInner,
        > + Send
        + Sync
        + 'static,
{
    pub fn new(
        service_id: String,
        z_session: zenoh::Session,
        handler: T,
    ) -> Self {
        ZrpcService {
            service_id,
            z_session,
            handler: Arc::new(handler),
            task: None,
            _conf: PhantomData,
        }
    }

    /// Declares the queryable and spawns the receive loop. Every query is
    /// served on its own task.
    pub async fn start(mut self) -> Result<Self, ZrpcError<C::ErrInner>> {
        let service_id = self.service_id.clone();
        info!("registering rpc on '{}'", service_id);
        let queryable = self
            .z_session
            .declare_queryable(service_id.clone())
            .await
            .map_err(ZrpcError::ConnectionError)?;
        let handler = self.handler.clone();
        let task = tokio::spawn(async move {
            loop {
                match queryable.recv_async().await {
                    Ok(query) => {
                        tokio::spawn(Self::handle(handler.clone(), query));
                    }
                    Err(err) => {
                        error!("error on queryable '{}': {}", service_id, err);
                        break;
                    }
                }
            }
        });
        self.task = Some(task);
        Ok(self)
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            info!("closing rpc on '{}'", self.service_id);
            task.abort();
        }
    }

    async fn handle(handler: Arc<T>, query: Query) {
        let Some(payload) = query.payload() else {
            warn!("receive rpc to '{}' without payload", query.key_expr());
            return;
        };
        match <C::In as MsgSerde>::from_zbyte(payload) {
            Ok(data) => match handler.handle(data).await {
                Ok(output) => Self::write_output(output, query).await,
                Err(err) => {
                    Self::write_error(ZrpcServerError::AppError(err), query)
                        .await
                }
            },
            Err(err) => {
                Self::write_error(ZrpcServerError::DecodeError(err), query)
                    .await
            }
        }
    }

    async fn write_output(out: <C::Out as MsgSerde>::Data, query: Query) {
        match <C::Out as MsgSerde>::to_zbyte(&out) {
            Ok(bytes) => {
                if let Err(e) =
                    query.reply(query.key_expr().clone(), bytes).await
                {
                    warn!("error on replying '{}', {}", query.key_expr(), e);
                }
            }
            Err(err) => {
                Self::write_error(ZrpcServerError::EncodeError(err), query)
                    .await
            }
        }
    }

    async fn write_error(err: ZrpcServerError<C::ErrInner>, query: Query) {
        match <C::Err as MsgSerde>::to_zbyte(&err) {
            Ok(bytes) => {
                if let Err(e) = query.reply_err(bytes).await {
                    warn!(
                        "error on error replying '{}', {}",
                        query.key_expr(),
                        e
                    );
                }
            }
            Err(e) => {
                error!("cannot encode error for '{}': {}", query.key_expr(), e)
            }
        }
    }
}

impl<T, C> Drop for ZrpcService<T, C>
where
    C: ZrpcTypeConfig,
    T: ZrpcServiceHander<
            In = <C::In as MsgSerde>::Data,
            Out = <C::Out as MsgSerde>::Data,
            Err = C::ErrInner,
        > + Send
        + Sync
        + 'static,
{
    fn drop(&mut self) {
        self.close();
    }
}
