use std::fmt;
use std::str::FromStr;

use crate::error::DMapError;

/// Identity of a node. Two members are the same node iff host and port are
/// equal.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
pub struct Member {
    pub host: String,
    pub port: u16,
}

impl Member {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Member {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Member {
    type Err = DMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            DMapError::Internal(format!("member `{s}` is not host:port"))
        })?;
        if host.is_empty() {
            return Err(DMapError::Internal(format!(
                "member `{s}` has no host"
            )));
        }
        let port = port.parse::<u16>().map_err(|e| {
            DMapError::Internal(format!("member `{s}` has invalid port: {e}"))
        })?;
        Ok(Member::new(host, port))
    }
}
