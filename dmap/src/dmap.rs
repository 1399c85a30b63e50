use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::cluster::DMapNode;
use crate::error::DMapError;
use crate::proto::{Operation, Response};
use crate::util::format_duration;

/// Handle on one named map. Maps need no creation step; the first put
/// creates them.
#[derive(Clone)]
pub struct DMap {
    node: Arc<DMapNode>,
    name: String,
    deadline: Option<Duration>,
}

impl DMap {
    pub(crate) fn new(node: Arc<DMapNode>, name: String) -> Self {
        DMap {
            node,
            name,
            deadline: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bounds every forwarded round trip made through this handle.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    async fn execute(&self, key: &str, op: Operation) -> Result<Response, DMapError> {
        self.node.execute(&self.name, key, op, self.deadline).await
    }

    pub async fn get<T: DeserializeOwned + 'static>(&self, key: &str) -> Result<T, DMapError> {
        let bytes = self.execute(key, Operation::Get).await?.into_value()?;
        Ok(self.node.codec().decode(&bytes)?)
    }

    pub async fn put<T: Serialize + 'static>(&self, key: &str, value: &T) -> Result<(), DMapError> {
        self.put_with_timeout(key, value, None).await
    }

    /// Puts `value` so that it expires `ttl` after the owner stores it.
    pub async fn put_ex<T: Serialize + 'static>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), DMapError> {
        self.put_with_timeout(key, value, Some(format_duration(ttl))).await
    }

    /// Puts with the entry lifetime given as a duration string such as
    /// `"30s"`; `None` keeps the entry until it is deleted.
    pub async fn put_with_timeout<T: Serialize + 'static>(
        &self,
        key: &str,
        value: &T,
        timeout: Option<String>,
    ) -> Result<(), DMapError> {
        let value = self.node.codec().encode(value)?;
        self.execute(key, Operation::Put { value, timeout }).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), DMapError> {
        self.execute(key, Operation::Delete).await?;
        Ok(())
    }

    /// Takes the lease on `key` for `timeout` (e.g. `"2s"`). Fails with
    /// [`DMapError::AlreadyLocked`] instead of waiting.
    pub async fn lock_with_timeout(&self, key: &str, timeout: &str) -> Result<(), DMapError> {
        let op = Operation::LockWithTimeout {
            timeout: timeout.to_owned(),
        };
        self.execute(key, op).await?;
        Ok(())
    }

    pub async fn unlock(&self, key: &str) -> Result<(), DMapError> {
        self.execute(key, Operation::Unlock).await?;
        Ok(())
    }

    /// Removes every entry of the map on every member.
    pub async fn destroy(&self) -> Result<(), DMapError> {
        self.node.destroy(&self.name, self.deadline).await
    }
}
