use std::time::Duration;

use anyerror::AnyError;

use crate::metadata::Member;

/// Failure kinds of a dmap operation. Serializable, so an owner's outcome
/// crosses the wire and reaches the original caller unchanged.
#[derive(
    thiserror::Error, serde::Serialize, serde::Deserialize, Debug, Clone,
)]
pub enum DMapError {
    #[error("key not found")]
    KeyNotFound,
    #[error("no such lock")]
    NoSuchLock,
    #[error("key is already locked")]
    AlreadyLocked,
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("forwarding to {owner} failed: {source}")]
    Forwarding {
        owner: Member,
        #[source]
        source: ForwardError,
    },
    #[error("hash key derived with version {found}, this node uses {expected}")]
    HashVersionMismatch { expected: u8, found: u8 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl DMapError {
    pub(crate) fn forwarding(owner: &Member, source: ForwardError) -> Self {
        DMapError::Forwarding {
            owner: owner.clone(),
            source,
        }
    }
}

#[derive(
    thiserror::Error,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
)]
pub enum CodecError {
    #[error("type `{0}` is not registered")]
    Unregistered(String),
    #[error("value shape `{0}` is not registered")]
    UnknownShape(String),
    #[error("expected `{expected}` but value is `{found}`")]
    TypeMismatch { expected: String, found: String },
    #[error("type name `{0}` is registered twice")]
    DuplicateRegistration(String),
    #[error("malformed value: {0}")]
    Malformed(String),
}

#[derive(
    thiserror::Error, serde::Serialize, serde::Deserialize, Debug, Clone,
)]
pub enum ForwardError {
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(AnyError),
    #[error("gave up after {0} hops")]
    HopLimit(u8),
}
