//! fin-store
//!
//! The two injected collaborators the core reconciles: a device-local replica
//! store and a remote authoritative store. This crate owns only the trait
//! surface and the fault model; concrete backends live elsewhere (the JSON
//! file store here is the durable local backend used by the CLI, the
//! in-memory pair lives in fin-testkit).
//!
//! The local side traffics in canonical [`Record`]s. The remote side traffics
//! in its own document shape (`serde_json::Value`); translation happens in
//! the sync engine, never here.

mod error;
mod file;
mod retry;

pub use error::StoreError;
pub use file::JsonFileStore;
pub use retry::{with_retry, RetryPolicy};

use async_trait::async_trait;
use fin_schemas::{EntityKind, Record};
use serde_json::Value;

/// Device-local replica store. Writes here are cheap and always available.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_all(&self, kind: EntityKind, account_id: &str)
        -> Result<Vec<Record>, StoreError>;

    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<Option<Record>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::AlreadyExists`] when the
    /// id is taken.
    async fn add(&self, record: Record, account_id: &str) -> Result<Record, StoreError>;

    /// Overwrite an existing record (also the tombstone write path).
    async fn update(&self, record: Record, account_id: &str) -> Result<Record, StoreError>;

    /// Physically remove a record. Only the tombstone purge sweep and the
    /// download-mode collection replacement call this.
    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<String, StoreError>;
}

/// Remote authoritative store, reachable only when online. Documents are in
/// the remote's native field naming; see the sync engine's shape functions.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn is_reachable(&self) -> bool;

    async fn get_all(&self, kind: EntityKind, account_id: &str) -> Result<Vec<Value>, StoreError>;

    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<Option<Value>, StoreError>;

    async fn add(
        &self,
        kind: EntityKind,
        doc: Value,
        account_id: &str,
    ) -> Result<Value, StoreError>;

    async fn update(
        &self,
        kind: EntityKind,
        doc: Value,
        account_id: &str,
    ) -> Result<Value, StoreError>;

    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<String, StoreError>;
}

/// Id of a remote-shaped document ("id" field), if present.
pub fn remote_doc_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}
