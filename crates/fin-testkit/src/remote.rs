use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use fin_schemas::EntityKind;
use fin_store::{remote_doc_id, RemoteStore, StoreError};

type Collections = BTreeMap<String, BTreeMap<EntityKind, BTreeMap<String, Value>>>;

/// In-memory [`RemoteStore`] holding remote-shaped documents.
///
/// Fault knobs: reachability toggle, scripted transient write failures, and
/// per-op counters so tests can assert a cycle's exact upload count.
#[derive(Default)]
pub struct MemoryRemoteStore {
    data: RwLock<Collections>,
    reachable: AtomicBool,
    failures_left: AtomicUsize,
    write_count: AtomicUsize,
    read_count: AtomicUsize,
    latency_ms: AtomicU64,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.reachable.store(true, Ordering::SeqCst);
        store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Simulate network latency on every call. Lets tests hold a sync cycle
    /// in flight long enough to observe concurrent behavior.
    pub fn set_latency(&self, latency: std::time::Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }

    /// Fail the next `n` writes with a transient error.
    pub fn fail_next_writes(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.write_count.store(0, Ordering::SeqCst);
        self.read_count.store(0, Ordering::SeqCst);
    }

    pub async fn seed(&self, kind: EntityKind, docs: Vec<Value>, account_id: &str) {
        let mut data = self.data.write().await;
        let coll = data
            .entry(account_id.to_string())
            .or_default()
            .entry(kind)
            .or_default();
        for doc in docs {
            let id = remote_doc_id(&doc).unwrap_or_default().to_string();
            coll.insert(id, doc);
        }
    }

    /// Raw document as stored, for assertions.
    pub async fn doc(&self, kind: EntityKind, id: &str, account_id: &str) -> Option<Value> {
        let data = self.data.read().await;
        data.get(account_id)
            .and_then(|a| a.get(&kind))
            .and_then(|c| c.get(id))
            .cloned()
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Transient("scripted remote failure".into()));
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn doc_id(doc: &Value) -> Result<String, StoreError> {
        remote_doc_id(doc)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Corrupt("remote document missing id".into()))
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn is_reachable(&self) -> bool {
        self.simulate_latency().await;
        self.reachable.load(Ordering::SeqCst)
    }

    async fn get_all(&self, kind: EntityKind, account_id: &str) -> Result<Vec<Value>, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.simulate_latency().await;
        self.read_count.fetch_add(1, Ordering::SeqCst);
        let data = self.data.read().await;
        Ok(data
            .get(account_id)
            .and_then(|a| a.get(&kind))
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_id(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<Option<Value>, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.simulate_latency().await;
        self.read_count.fetch_add(1, Ordering::SeqCst);
        let data = self.data.read().await;
        Ok(data
            .get(account_id)
            .and_then(|a| a.get(&kind))
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn add(
        &self,
        kind: EntityKind,
        doc: Value,
        account_id: &str,
    ) -> Result<Value, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.simulate_latency().await;
        self.check_write()?;
        let id = Self::doc_id(&doc)?;
        let mut data = self.data.write().await;
        let coll = data
            .entry(account_id.to_string())
            .or_default()
            .entry(kind)
            .or_default();
        if coll.contains_key(&id) {
            return Err(StoreError::AlreadyExists { kind, id });
        }
        coll.insert(id, doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        kind: EntityKind,
        doc: Value,
        account_id: &str,
    ) -> Result<Value, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.simulate_latency().await;
        self.check_write()?;
        let id = Self::doc_id(&doc)?;
        let mut data = self.data.write().await;
        data.entry(account_id.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .insert(id, doc.clone());
        Ok(doc)
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<String, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.simulate_latency().await;
        self.check_write()?;
        let mut data = self.data.write().await;
        data.get_mut(account_id)
            .and_then(|a| a.get_mut(&kind))
            .and_then(|c| c.remove(id));
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACCT: &str = "acct-1";

    #[tokio::test]
    async fn unreachable_remote_refuses_everything() {
        let store = MemoryRemoteStore::new();
        store.set_reachable(false);
        assert!(!store.is_reachable().await);
        let err = store.get_all(EntityKind::Wallet, ACCT).await.unwrap_err();
        assert_eq!(err, StoreError::Unavailable);
    }

    #[tokio::test]
    async fn add_twice_reports_already_exists() {
        let store = MemoryRemoteStore::new();
        let doc = json!({"id": "w-1", "name": "Cash"});
        store
            .add(EntityKind::Wallet, doc.clone(), ACCT)
            .await
            .unwrap();
        let err = store.add(EntityKind::Wallet, doc, ACCT).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn scripted_failures_then_recover() {
        let store = MemoryRemoteStore::new();
        store.fail_next_writes(2);
        let doc = json!({"id": "w-1"});
        assert!(store
            .add(EntityKind::Wallet, doc.clone(), ACCT)
            .await
            .unwrap_err()
            .is_transient());
        assert!(store
            .add(EntityKind::Wallet, doc.clone(), ACCT)
            .await
            .unwrap_err()
            .is_transient());
        store.add(EntityKind::Wallet, doc, ACCT).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }
}
