use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use fin_schemas::{EntityKind, Record};
use fin_store::{LocalStore, StoreError};

type Collections = BTreeMap<String, BTreeMap<EntityKind, BTreeMap<String, Record>>>;

/// In-memory [`LocalStore`] with scripted write failures.
#[derive(Default)]
pub struct MemoryLocalStore {
    data: RwLock<Collections>,
    /// Writes remaining before failures start; once `failures_left` > 0 each
    /// write consumes one failure instead of applying.
    failures_left: AtomicUsize,
    writes_until_failure: AtomicUsize,
    write_count: AtomicUsize,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `ok` writes succeed, then fail the next `failing` writes with a
    /// transient error. Used to force rollback mid-operation.
    pub fn fail_writes_after(&self, ok: usize, failing: usize) {
        self.writes_until_failure.store(ok, Ordering::SeqCst);
        self.failures_left.store(failing, Ordering::SeqCst);
    }

    /// Total mutating calls that were allowed through.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub async fn seed(&self, records: Vec<Record>, account_id: &str) {
        let mut data = self.data.write().await;
        for record in records {
            data.entry(account_id.to_string())
                .or_default()
                .entry(record.kind())
                .or_default()
                .insert(record.id.clone(), record);
        }
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            let until = self.writes_until_failure.load(Ordering::SeqCst);
            if until > 0 {
                self.writes_until_failure.store(until - 1, Ordering::SeqCst);
            } else {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Transient("scripted write failure".into()));
            }
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get_all(
        &self,
        kind: EntityKind,
        account_id: &str,
    ) -> Result<Vec<Record>, StoreError> {
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
    ) -> Result<Option<Record>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .get(account_id)
            .and_then(|a| a.get(&kind))
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn add(&self, record: Record, account_id: &str) -> Result<Record, StoreError> {
        self.check_write()?;
        let mut data = self.data.write().await;
        let coll = data
            .entry(account_id.to_string())
            .or_default()
            .entry(record.kind())
            .or_default();
        if coll.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                kind: record.kind(),
                id: record.id.clone(),
            });
        }
        coll.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: Record, account_id: &str) -> Result<Record, StoreError> {
        self.check_write()?;
        let mut data = self.data.write().await;
        let coll = data
            .entry(account_id.to_string())
            .or_default()
            .entry(record.kind())
            .or_default();
        if !coll.contains_key(&record.id) {
            return Err(StoreError::NotFound {
                kind: record.kind(),
                id: record.id.clone(),
            });
        }
        coll.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<String, StoreError> {
        self.check_write()?;
        let mut data = self.data.write().await;
        let removed = data
            .get_mut(account_id)
            .and_then(|a| a.get_mut(&kind))
            .and_then(|c| c.remove(id));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ts, wallet_record};

    const ACCT: &str = "acct-1";

    #[tokio::test]
    async fn scripted_failure_fires_after_ok_writes() {
        let store = MemoryLocalStore::new();
        store.fail_writes_after(1, 1);

        store
            .add(wallet_record("w-1", "Cash", 10, ts(1)), ACCT)
            .await
            .unwrap();
        let err = store
            .add(wallet_record("w-2", "Bank", 20, ts(1)), ACCT)
            .await
            .unwrap_err();
        assert!(err.is_transient());

        // Failure budget exhausted: writes flow again.
        store
            .add(wallet_record("w-3", "Spare", 30, ts(1)), ACCT)
            .await
            .unwrap();
        assert_eq!(store.write_count(), 2);
    }
}
