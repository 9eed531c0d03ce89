//! fin-backup
//!
//! Disaster-recovery export/import of one account's full local data set as a
//! portable JSON document. Export captures live records only; import
//! replaces every local collection in dependency order and marks the replica
//! dirty so the next sync propagates it.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use fin_schemas::{EntityKind, Record};
use fin_store::{LocalStore, StoreError};

pub const BACKUP_VERSION: u32 = 1;

/// Collections are stored one field per entity type, so the document stays
/// readable and diffs cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupData {
    pub transactions: Vec<Record>,
    pub categories: Vec<Record>,
    pub wallets: Vec<Record>,
    pub transfers: Vec<Record>,
    pub tags: Vec<Record>,
    pub budgets: Vec<Record>,
    pub recurring: Vec<Record>,
}

impl BackupData {
    fn records(&self, kind: EntityKind) -> &[Record] {
        match kind {
            EntityKind::Transaction => &self.transactions,
            EntityKind::Category => &self.categories,
            EntityKind::Wallet => &self.wallets,
            EntityKind::Transfer => &self.transfers,
            EntityKind::Tag => &self.tags,
            EntityKind::Budget => &self.budgets,
            EntityKind::Recurring => &self.recurring,
        }
    }

    fn records_mut(&mut self, kind: EntityKind) -> &mut Vec<Record> {
        match kind {
            EntityKind::Transaction => &mut self.transactions,
            EntityKind::Category => &mut self.categories,
            EntityKind::Wallet => &mut self.wallets,
            EntityKind::Transfer => &mut self.transfers,
            EntityKind::Tag => &mut self.tags,
            EntityKind::Budget => &mut self.budgets,
            EntityKind::Recurring => &mut self.recurring,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub count_per_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub version: u32,
    pub export_date: DateTime<Utc>,
    pub account_id: String,
    pub data: BackupData,
    pub metadata: BackupMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupError {
    /// The document was produced by a newer, unknown format.
    UnsupportedVersion { found: u32 },
    Store(StoreError),
}

impl std::fmt::Display for BackupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupError::UnsupportedVersion { found } => write!(
                f,
                "backup version {found} is newer than supported version {BACKUP_VERSION}"
            ),
            BackupError::Store(e) => write!(f, "store failure during backup: {e}"),
        }
    }
}

impl std::error::Error for BackupError {}

impl From<StoreError> for BackupError {
    fn from(e: StoreError) -> Self {
        BackupError::Store(e)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: BTreeMap<String, usize>,
    pub removed: usize,
}

/// Capture every live (non-tombstoned) record of the account.
pub async fn export_backup(
    local: &dyn LocalStore,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<BackupDocument, BackupError> {
    let mut data = BackupData::default();
    let mut counts = BTreeMap::new();
    for kind in EntityKind::DEPENDENCY_ORDER {
        let records: Vec<Record> = local
            .get_all(kind, account_id)
            .await?
            .into_iter()
            .filter(|r| !r.is_tombstoned())
            .collect();
        counts.insert(kind.as_str().to_string(), records.len());
        *data.records_mut(kind) = records;
    }

    info!(account = account_id, "backup exported");
    Ok(BackupDocument {
        version: BACKUP_VERSION,
        export_date: now,
        account_id: account_id.to_string(),
        data,
        metadata: BackupMetadata {
            count_per_type: counts,
        },
    })
}

/// Replace every local collection with the document's contents, in
/// dependency order. Imported records get a fresh canonical timestamp and
/// are flagged pending upload.
pub async fn import_backup(
    local: &dyn LocalStore,
    document: &BackupDocument,
    now: DateTime<Utc>,
) -> Result<ImportReport, BackupError> {
    if document.version > BACKUP_VERSION {
        return Err(BackupError::UnsupportedVersion {
            found: document.version,
        });
    }

    let mut report = ImportReport::default();
    for kind in EntityKind::DEPENDENCY_ORDER {
        for existing in local.get_all(kind, &document.account_id).await? {
            local
                .delete(kind, &existing.id, &document.account_id)
                .await?;
            report.removed += 1;
        }
        let mut imported = 0usize;
        for record in document.data.records(kind) {
            let mut record = record.clone();
            record.touch(now);
            local.add(record, &document.account_id).await?;
            imported += 1;
        }
        report.imported.insert(kind.as_str().to_string(), imported);
    }

    info!(
        account = %document.account_id,
        removed = report.removed,
        "backup imported, replica marked dirty"
    );
    Ok(report)
}

/// Write a document to disk as pretty JSON, creating parent directories.
pub fn write_backup_file(path: impl AsRef<Path>, document: &BackupDocument) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create_dir_all {parent:?}"))?;
    }
    let bytes = serde_json::to_vec_pretty(document).context("serialize backup document")?;
    std::fs::write(path, bytes).with_context(|| format!("write backup to {path:?}"))
}

/// Read and parse a backup document from disk.
pub fn read_backup_file(path: impl AsRef<Path>) -> Result<BackupDocument> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("read backup from {path:?}"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse backup document {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fin_schemas::SyncStatus;
    use fin_testkit::{
        category_record, expense_record, ts, wallet_record, MemoryLocalStore,
    };

    const ACCT: &str = "acct-1";

    async fn seeded_store() -> MemoryLocalStore {
        let local = MemoryLocalStore::new();
        let mut dead = category_record("cat-dead", "Gone", ts(5));
        dead.tombstone(ts(6));
        local
            .seed(
                vec![
                    category_record("cat-1", "Food", ts(1)),
                    dead,
                    wallet_record("w-1", "Cash", 100, ts(1)),
                    expense_record("tx-1", "w-1", "cat-1", 25, ts(2)),
                ],
                ACCT,
            )
            .await;
        local
    }

    #[tokio::test]
    async fn export_captures_live_records_only() {
        let local = seeded_store().await;
        let doc = export_backup(&local, ACCT, ts(100)).await.unwrap();

        assert_eq!(doc.version, BACKUP_VERSION);
        assert_eq!(doc.data.categories.len(), 1);
        assert_eq!(doc.data.wallets.len(), 1);
        assert_eq!(doc.data.transactions.len(), 1);
        assert_eq!(doc.metadata.count_per_type["category"], 1);
        assert_eq!(doc.metadata.count_per_type["transaction"], 1);
    }

    #[tokio::test]
    async fn import_replaces_collections_and_marks_dirty() {
        let source = seeded_store().await;
        let doc = export_backup(&source, ACCT, ts(100)).await.unwrap();

        let target = MemoryLocalStore::new();
        target
            .seed(vec![category_record("stale", "Stale", ts(1))], ACCT)
            .await;

        let report = import_backup(&target, &doc, ts(200)).await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.imported["category"], 1);

        let categories = target.get_all(EntityKind::Category, ACCT).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, "cat-1");
        assert_eq!(categories[0].sync_status, SyncStatus::Pending);
        assert_eq!(categories[0].last_modified, ts(200));
    }

    #[tokio::test]
    async fn newer_version_rejected() {
        let local = seeded_store().await;
        let mut doc = export_backup(&local, ACCT, ts(100)).await.unwrap();
        doc.version = BACKUP_VERSION + 1;

        let err = import_backup(&local, &doc, ts(200)).await.unwrap_err();
        assert_eq!(
            err,
            BackupError::UnsupportedVersion {
                found: BACKUP_VERSION + 1
            }
        );
    }

    #[tokio::test]
    async fn file_round_trip() {
        let local = seeded_store().await;
        let doc = export_backup(&local, ACCT, ts(100)).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backups/finances.json");
        write_backup_file(&path, &doc).unwrap();
        let loaded = read_backup_file(&path).unwrap();

        assert_eq!(loaded.account_id, doc.account_id);
        assert_eq!(loaded.data.transactions.len(), doc.data.transactions.len());
        assert_eq!(loaded.metadata.count_per_type, doc.metadata.count_per_type);
    }
}
