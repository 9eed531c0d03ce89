//! File-backed [`RemoteStore`] used by the CLI.
//!
//! Stands in for the real remote service: documents are kept in their
//! remote shape in one JSON file, so two replicas pointed at the same
//! "remote file" sync against each other exactly as they would against the
//! hosted store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use fin_schemas::EntityKind;
use fin_store::{remote_doc_id, RemoteStore, StoreError};

type Image = BTreeMap<String, BTreeMap<EntityKind, BTreeMap<String, Value>>>;

pub struct FileRemoteStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRemoteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Image, StoreError> {
        if !self.path.exists() {
            return Ok(Image::default());
        }
        let bytes = std::fs::read(&self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn save(&self, image: &Image) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let bytes =
            serde_json::to_vec_pretty(image).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io(e.to_string()))
    }

    fn doc_id(doc: &Value) -> Result<String, StoreError> {
        remote_doc_id(doc)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Corrupt("remote document missing id".into()))
    }
}

#[async_trait]
impl RemoteStore for FileRemoteStore {
    async fn is_reachable(&self) -> bool {
        true
    }

    async fn get_all(&self, kind: EntityKind, account_id: &str) -> Result<Vec<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        let image = self.load()?;
        Ok(image
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
        let _guard = self.lock.lock().await;
        let image = self.load()?;
        Ok(image
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
        let _guard = self.lock.lock().await;
        let mut image = self.load()?;
        let id = Self::doc_id(&doc)?;
        let coll = image
            .entry(account_id.to_string())
            .or_default()
            .entry(kind)
            .or_default();
        if coll.contains_key(&id) {
            return Err(StoreError::AlreadyExists { kind, id });
        }
        coll.insert(id, doc.clone());
        self.save(&image)?;
        Ok(doc)
    }

    async fn update(
        &self,
        kind: EntityKind,
        doc: Value,
        account_id: &str,
    ) -> Result<Value, StoreError> {
        let _guard = self.lock.lock().await;
        let mut image = self.load()?;
        let id = Self::doc_id(&doc)?;
        image
            .entry(account_id.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .insert(id, doc.clone());
        self.save(&image)?;
        Ok(doc)
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        account_id: &str,
    ) -> Result<String, StoreError> {
        let _guard = self.lock.lock().await;
        let mut image = self.load()?;
        image
            .get_mut(account_id)
            .and_then(|a| a.get_mut(&kind))
            .and_then(|c| c.remove(id));
        self.save(&image)?;
        Ok(id.to_string())
    }
}
