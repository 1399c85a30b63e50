pub mod kv_api;

pub use kv_api::{serve, KvHandler, KvService};
