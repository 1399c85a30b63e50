mod client;
mod error;
mod msg;
mod service;

pub use client::ZrpcClient;
pub use error::ZrpcError;
pub use error::ZrpcServerError;
#[cfg(feature = "bincode")]
pub use msg::BincodeMsgSerde;
pub use msg::MsgSerde;
pub use service::ZrpcService;
pub use service::ZrpcServiceHander;

/// Binds the request, response and error serdes of one RPC endpoint.
pub trait ZrpcTypeConfig: Send + Sync + 'static {
    type In: MsgSerde;
    type Out: MsgSerde;
    type Err: MsgSerde<Data = ZrpcServerError<Self::ErrInner>>;
    type ErrInner: Send
        + Sync
        + std::fmt::Debug
        + std::fmt::Display
        + 'static;
}
