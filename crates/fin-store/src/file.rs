//! JSON-file-backed local store.
//!
//! One file per device holds every account's collections. Each operation
//! loads, mutates, and rewrites the file under an async mutex; the rewrite
//! goes through a temp file + rename so a crash never leaves a torn image.
//! Suitable for the CLI and tests, not for high write volume.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use fin_schemas::{EntityKind, Record};

use crate::{LocalStore, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileImage {
    /// account id -> entity kind -> record id -> record
    accounts: BTreeMap<String, BTreeMap<EntityKind, BTreeMap<String, Record>>>,
}

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<FileImage, StoreError> {
        if !self.path.exists() {
            return Ok(FileImage::default());
        }
        let bytes = std::fs::read(&self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn save(&self, image: &FileImage) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let bytes =
            serde_json::to_vec_pretty(image).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))
    }
}

fn collection<'a>(
    image: &'a mut FileImage,
    kind: EntityKind,
    account_id: &str,
) -> &'a mut BTreeMap<String, Record> {
    image
        .accounts
        .entry(account_id.to_string())
        .or_default()
        .entry(kind)
        .or_default()
}

#[async_trait]
impl LocalStore for JsonFileStore {
    async fn get_all(
        &self,
        kind: EntityKind,
        account_id: &str,
    ) -> Result<Vec<Record>, StoreError> {
        let _guard = self.lock.lock().await;
        let image = self.load()?;
        Ok(image
            .accounts
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
        let _guard = self.lock.lock().await;
        let image = self.load()?;
        Ok(image
            .accounts
            .get(account_id)
            .and_then(|a| a.get(&kind))
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn add(&self, record: Record, account_id: &str) -> Result<Record, StoreError> {
        let _guard = self.lock.lock().await;
        let mut image = self.load()?;
        let coll = collection(&mut image, record.kind(), account_id);
        if coll.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                kind: record.kind(),
                id: record.id.clone(),
            });
        }
        coll.insert(record.id.clone(), record.clone());
        self.save(&image)?;
        Ok(record)
    }

    async fn update(&self, record: Record, account_id: &str) -> Result<Record, StoreError> {
        let _guard = self.lock.lock().await;
        let mut image = self.load()?;
        let coll = collection(&mut image, record.kind(), account_id);
        if !coll.contains_key(&record.id) {
            return Err(StoreError::NotFound {
                kind: record.kind(),
                id: record.id.clone(),
            });
        }
        coll.insert(record.id.clone(), record.clone());
        self.save(&image)?;
        Ok(record)
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<String, StoreError> {
        let _guard = self.lock.lock().await;
        let mut image = self.load()?;
        let coll = collection(&mut image, kind, account_id);
        if coll.remove(id).is_none() {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        self.save(&image)?;
        Ok(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fin_schemas::{Money, Payload, Wallet, WalletKind};

    const ACCT: &str = "acct-1";

    fn wallet(id: &str, balance: i64) -> Record {
        Record::with_id(
            id,
            Payload::Wallet(Wallet {
                name: "Cash".to_string(),
                kind: WalletKind::Cash,
                balance: Money::from_major(balance),
            }),
            Utc.timestamp_opt(1_000, 0).unwrap(),
        )
    }

    fn store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("replica.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn add_then_get_roundtrips() {
        let (_dir, store) = store();
        store.add(wallet("w-1", 100), ACCT).await.unwrap();
        let got = store
            .get_by_id(EntityKind::Wallet, "w-1", ACCT)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.as_wallet().unwrap().balance, Money::from_major(100));
    }

    #[tokio::test]
    async fn add_duplicate_id_rejected() {
        let (_dir, store) = store();
        store.add(wallet("w-1", 100), ACCT).await.unwrap();
        let err = store.add(wallet("w-1", 200), ACCT).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_missing_record_rejected() {
        let (_dir, store) = store();
        let err = store.update(wallet("w-9", 1), ACCT).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.json");
        JsonFileStore::new(&path)
            .add(wallet("w-1", 77), ACCT)
            .await
            .unwrap();

        let reopened = JsonFileStore::new(&path);
        let all = reopened.get_all(EntityKind::Wallet, ACCT).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "w-1");
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let (_dir, store) = store();
        store.add(wallet("w-1", 100), "acct-a").await.unwrap();
        assert!(store
            .get_all(EntityKind::Wallet, "acct-b")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn delete_removes_physically() {
        let (_dir, store) = store();
        store.add(wallet("w-1", 100), ACCT).await.unwrap();
        store
            .delete(EntityKind::Wallet, "w-1", ACCT)
            .await
            .unwrap();
        assert!(store
            .get_by_id(EntityKind::Wallet, "w-1", ACCT)
            .await
            .unwrap()
            .is_none());
    }
}
