use std::error::Error;
use std::time::Duration;

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub enum Infallible {}

impl std::fmt::Display for Infallible {
    fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {}
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ZrpcError<E = Infallible>
where
    E: std::fmt::Debug + std::fmt::Display,
{
    #[error("connection error: {0}")]
    ConnectionError(Box<dyn Error + Send + Sync>),
    #[error("encode error: {0}")]
    EncodeError(anyerror::AnyError),
    #[error("decode error: {0}")]
    DecodeError(anyerror::AnyError),
    #[error("no reply from '{0}'")]
    NoReply(String),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("server error: {0}")]
    ServerError(ZrpcServerError<E>),
}

#[derive(
    thiserror::Error, serde::Serialize, serde::Deserialize, Clone, Debug,
)]
pub enum ZrpcServerError<E> {
    #[error("app error: {0}")]
    AppError(E),
    #[error("decode error: {0}")]
    DecodeError(anyerror::AnyError),
    #[error("encode error: {0}")]
    EncodeError(anyerror::AnyError),
}
