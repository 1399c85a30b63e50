//! Value codec.
//!
//! Values cross node boundaries as a bincode [`Envelope`] that names the
//! registered shape of its payload. The shapes a process understands are
//! fixed at startup in a [`CodecRegistry`]; the registry is immutable once
//! built and shared behind an `Arc`.

mod value;

pub use value::Value;

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;
use crate::util::{bincode_decode, bincode_encode};

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct Envelope {
    type_name: String,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct CodecRegistry {
    names: HashMap<TypeId, String>,
    types: HashMap<String, TypeId>,
}

impl CodecRegistry {
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    #[inline]
    pub fn name_of<T: 'static>(&self) -> Option<&str> {
        self.names.get(&TypeId::of::<T>()).map(String::as_str)
    }

    #[inline]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }
}

#[derive(Debug, Default)]
pub struct CodecRegistryBuilder {
    entries: Vec<(TypeId, String)>,
}

impl CodecRegistryBuilder {
    pub fn register<T>(mut self, type_name: impl Into<String>) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.entries.push((TypeId::of::<T>(), type_name.into()));
        self
    }

    /// Registers [`Value`] and the primitive shapes other languages can
    /// produce.
    pub fn with_builtin(self) -> Self {
        self.register::<Value>("dmap.Value")
            .register::<String>("string")
            .register::<Vec<u8>>("bytes")
            .register::<i64>("i64")
            .register::<u64>("u64")
            .register::<f64>("f64")
            .register::<bool>("bool")
    }

    pub fn build(self) -> Result<CodecRegistry, CodecError> {
        let mut registry = CodecRegistry::default();
        for (type_id, name) in self.entries {
            if registry.types.contains_key(&name)
                || registry.names.contains_key(&type_id)
            {
                return Err(CodecError::DuplicateRegistration(name));
            }
            registry.types.insert(name.clone(), type_id);
            registry.names.insert(type_id, name);
        }
        Ok(registry)
    }
}

#[derive(Debug, Clone)]
pub struct Codec {
    registry: Arc<CodecRegistry>,
}

impl Codec {
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Codec { registry }
    }

    pub fn encode<T: Serialize + 'static>(
        &self,
        value: &T,
    ) -> Result<Bytes, CodecError> {
        let name = self
            .registry
            .name_of::<T>()
            .ok_or_else(|| CodecError::Unregistered(type_name::<T>().into()))?;
        let envelope = Envelope {
            type_name: name.to_owned(),
            payload: bincode_encode(value)
                .map_err(|e| CodecError::Malformed(e.to_string()))?,
        };
        bincode_encode(&envelope)
            .map(Bytes::from)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }

    pub fn decode<T: DeserializeOwned + 'static>(
        &self,
        bytes: &[u8],
    ) -> Result<T, CodecError> {
        let expected = self
            .registry
            .name_of::<T>()
            .ok_or_else(|| CodecError::Unregistered(type_name::<T>().into()))?;
        let envelope = self.open(bytes)?;
        if envelope.type_name != expected {
            return Err(CodecError::TypeMismatch {
                expected: expected.to_owned(),
                found: envelope.type_name,
            });
        }
        bincode_decode(&envelope.payload)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }

    /// Checks that `bytes` is an envelope of a registered shape and
    /// returns the shape name.
    pub fn inspect(&self, bytes: &[u8]) -> Result<String, CodecError> {
        self.open(bytes).map(|e| e.type_name)
    }

    fn open(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        let envelope: Envelope = bincode_decode(bytes)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        if !self.registry.contains(&envelope.type_name) {
            return Err(CodecError::UnknownShape(envelope.type_name));
        }
        Ok(envelope)
    }
}
