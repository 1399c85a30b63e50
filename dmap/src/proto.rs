//! Messages exchanged between nodes.

use bytes::Bytes;
use dmap_zrpc::{BincodeMsgSerde, ZrpcServerError, ZrpcTypeConfig};

use crate::error::DMapError;
use crate::hkey::HashKey;

/// Operation on a single key. Timeout strings travel unparsed so the owner
/// applies exactly what the caller asked for.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub enum Operation {
    Get,
    Put {
        value: Bytes,
        timeout: Option<String>,
    },
    Delete,
    LockWithTimeout {
        timeout: String,
    },
    Unlock,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Put { .. } => "put",
            Operation::Delete => "delete",
            Operation::LockWithTimeout { .. } => "lock",
            Operation::Unlock => "unlock",
        }
    }
}

/// A key operation already resolved to its hash key. `hops` counts how many
/// times the request has been forwarded.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct KeyRequest {
    pub map_name: String,
    pub hkey: HashKey,
    /// [`HASH_VERSION`](crate::hkey::HASH_VERSION) of the node that derived
    /// `hkey`.
    pub hash_version: u8,
    pub op: Operation,
    pub hops: u8,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub enum Request {
    Key(KeyRequest),
    /// Drop the receiving node's entries of a map. Never forwarded further.
    Destroy { map_name: String },
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Value(Bytes),
    Empty,
}

impl Response {
    pub fn into_value(self) -> Result<Bytes, DMapError> {
        match self {
            Response::Value(v) => Ok(v),
            Response::Empty => Err(DMapError::Internal(
                "owner replied without a value".into(),
            )),
        }
    }
}

pub struct KvTypeConfig;

impl ZrpcTypeConfig for KvTypeConfig {
    type In = BincodeMsgSerde<Request>;

    type Out = BincodeMsgSerde<Response>;

    type Err = BincodeMsgSerde<ZrpcServerError<DMapError>>;

    type ErrInner = DMapError;
}

/// Key expression a member serves its key-value RPC on.
pub fn kv_key_expr(prefix: &str, member: &crate::metadata::Member) -> String {
    format!("{}/{}/{}/kv", prefix, member.host, member.port)
}
