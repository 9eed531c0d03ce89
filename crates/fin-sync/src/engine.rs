use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fin_integrity::{check_referential_integrity, validate_collection, AccountSnapshot, AutoFixer};
use fin_schemas::{EntityKind, Record, SyncStatus};
use fin_store::{remote_doc_id, with_retry, LocalStore, RemoteStore, StoreError};

use crate::{
    from_remote_shape, records_conflict, resolve, to_remote_shape, ConflictEntry,
    ConflictResolution, KindReport, SyncConfig, SyncError, SyncMode, SyncReport, SyncState,
    VersionInfo,
};

/// Default retention for tombstones before the purge sweep may remove them.
pub const DEFAULT_TOMBSTONE_RETENTION_DAYS: i64 = 30;

/// Outcome of a tombstone purge sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub local_purged: usize,
    pub remote_purged: usize,
}

/// Reconciles one account between the local replica and the remote store.
///
/// Constructed once at application start; collaborators receive it by
/// reference. `guard` is the store-wide mutex shared with the ledger
/// service.
pub struct SyncService {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    account_id: String,
    guard: Arc<Mutex<()>>,
    config: SyncConfig,
    state: RwLock<SyncState>,
    in_flight: AtomicBool,
    cancel: CancellationToken,
}

impl SyncService {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        account_id: impl Into<String>,
        guard: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            local,
            remote,
            account_id: account_id.into(),
            guard,
            config: SyncConfig::default(),
            state: RwLock::new(SyncState::Idle),
            in_flight: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Token that aborts an in-flight cycle between entity kinds. Partially
    /// reconciled kinds are fine; re-running converges.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn state(&self) -> SyncState {
        *self.state.read().await
    }

    /// Run one sync cycle. Exactly one may be in flight; a concurrent call
    /// fails fast with [`SyncError::AlreadyRunning`].
    pub async fn sync(&self, mode: SyncMode) -> Result<SyncReport, SyncError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyRunning);
        }
        let result = self.sync_inner(mode).await;
        *self.state.write().await = match &result {
            Err(SyncError::Offline) => SyncState::Paused,
            _ => SyncState::Idle,
        };
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn sync_inner(&self, mode: SyncMode) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now();
        if !self.remote.is_reachable().await {
            warn!("sync requested while offline");
            return Err(SyncError::Offline);
        }

        // Ledger mutations and this cycle serialize on the same guard, so a
        // half-written wallet balance is never uploaded.
        let _guard = self.guard.lock().await;

        *self.state.write().await = SyncState::Validating;
        self.run_validation().await?;

        *self.state.write().await = SyncState::Syncing(mode);
        let mut report = SyncReport {
            mode,
            started_at,
            finished_at: started_at,
            per_kind: Vec::new(),
            conflicts: Vec::new(),
        };

        for kind in EntityKind::DEPENDENCY_ORDER {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let kind_report = match mode {
                SyncMode::Upload => self.upload_kind(kind).await?,
                SyncMode::Download => self.download_kind(kind).await?,
                SyncMode::Bidirectional => {
                    self.bidirectional_kind(kind, &mut report.conflicts).await?
                }
            };
            report.per_kind.push(kind_report);
        }

        report.finished_at = Utc::now();
        info!(
            mode = ?mode,
            uploaded = report.total_uploaded(),
            downloaded = report.total_downloaded(),
            conflicts = report.total_conflicts(),
            "sync cycle complete"
        );
        Ok(report)
    }

    /// Validation pass: schema reports are logged, fixable integrity issues
    /// are repaired through the normal local mutation path, the rest are
    /// warned about. Issues never block the cycle.
    async fn run_validation(&self) -> Result<(), SyncError> {
        let snapshot = AccountSnapshot::load(self.local.as_ref(), &self.account_id).await?;
        for kind in EntityKind::DEPENDENCY_ORDER {
            let report = validate_collection(kind, snapshot.records(kind));
            if !report.is_clean() {
                warn!(
                    %kind,
                    invalid = report.invalid_count,
                    "schema validation found invalid records"
                );
            }
        }

        let integrity = check_referential_integrity(&snapshot);
        if !integrity.is_clean() {
            warn!(
                issues = integrity.summary.issue_count,
                critical = integrity.summary.critical,
                "referential integrity issues detected"
            );
            let fixer = AutoFixer::new(self.local.as_ref(), &self.account_id);
            let outcome = fixer.apply(&integrity.issues, Utc::now()).await?;
            info!(
                fixed = outcome.fixed,
                skipped = outcome.skipped,
                "integrity auto-fix pass complete"
            );
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Per-kind reconciliation
    // -----------------------------------------------------------------------

    async fn upload_kind(&self, kind: EntityKind) -> Result<KindReport, SyncError> {
        let mut report = KindReport::new(kind);
        let locals = self.local.get_all(kind, &self.account_id).await?;
        let remotes = self.remote_get_all(kind).await?;

        for record in locals.into_iter().filter(|r| !r.is_tombstoned()) {
            let shape = to_remote_shape(&record);
            match remotes.get(&record.id) {
                Some(existing) if *existing == shape => {
                    if record.sync_status == SyncStatus::Pending {
                        self.mark_synced(record).await?;
                    }
                }
                Some(_) => {
                    self.remote_put(kind, shape).await?;
                    self.mark_synced(record).await?;
                    report.uploaded += 1;
                }
                None => {
                    self.remote_put(kind, shape).await?;
                    self.mark_synced(record).await?;
                    report.uploaded += 1;
                }
            }
        }
        Ok(report)
    }

    async fn download_kind(&self, kind: EntityKind) -> Result<KindReport, SyncError> {
        let mut report = KindReport::new(kind);

        // Download takes only the remote's live contents.
        let mut live_remote: BTreeMap<String, Record> = BTreeMap::new();
        for (id, doc) in self.remote_get_all(kind).await? {
            let incoming = from_remote_shape(kind, &doc)?;
            if !incoming.is_tombstoned() {
                live_remote.insert(id, incoming);
            }
        }

        // Replace semantics: anything without a live remote counterpart and
        // not pending upload is removed locally.
        let locals = self.local.get_all(kind, &self.account_id).await?;
        for record in &locals {
            if !live_remote.contains_key(&record.id) && record.sync_status != SyncStatus::Pending {
                self.local
                    .delete(kind, &record.id, &self.account_id)
                    .await?;
            }
        }

        for (id, incoming) in live_remote {
            match locals.iter().find(|r| r.id == id) {
                Some(existing)
                    if existing.payload == incoming.payload
                        && existing.last_modified == incoming.last_modified
                        && !existing.is_tombstoned() => {}
                _ => {
                    self.apply_locally(incoming).await?;
                    report.downloaded += 1;
                }
            }
        }
        Ok(report)
    }

    async fn bidirectional_kind(
        &self,
        kind: EntityKind,
        conflicts: &mut Vec<ConflictEntry>,
    ) -> Result<KindReport, SyncError> {
        let mut report = KindReport::new(kind);
        let locals: BTreeMap<String, Record> = self
            .local
            .get_all(kind, &self.account_id)
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        let mut remotes: BTreeMap<String, Record> = BTreeMap::new();
        for (id, doc) in self.remote_get_all(kind).await? {
            remotes.insert(id, from_remote_shape(kind, &doc)?);
        }

        // Local-only → upload. A record created and deleted offline never
        // reached the remote; its tombstone just ages out locally.
        for (id, record) in &locals {
            if remotes.contains_key(id) {
                continue;
            }
            if record.is_tombstoned() {
                continue;
            }
            self.remote_put(kind, to_remote_shape(record)).await?;
            self.mark_synced(record.clone()).await?;
            report.uploaded += 1;
        }

        // Remote-only → download.
        for (id, record) in &remotes {
            if locals.contains_key(id) {
                continue;
            }
            if record.is_tombstoned() {
                continue;
            }
            self.apply_locally(record.clone()).await?;
            report.downloaded += 1;
        }

        // Present in both → conflict check.
        for (id, local) in &locals {
            let Some(remote) = remotes.get(id) else {
                continue;
            };
            if !records_conflict(local, remote) {
                if local.sync_status == SyncStatus::Pending {
                    self.mark_synced(local.clone()).await?;
                }
                continue;
            }

            let (resolution, reason) = resolve(local, remote);
            let entry = ConflictEntry {
                entity_kind: kind,
                entity_id: id.clone(),
                local_version: VersionInfo::from(local),
                remote_version: VersionInfo::from(remote),
                resolution,
                reason,
            };
            info!(
                %kind,
                id = %id,
                resolution = ?resolution,
                reason = ?reason,
                "conflict resolved"
            );
            match resolution {
                ConflictResolution::RemoteWins => {
                    // One local write: the loser is overwritten whole.
                    self.apply_locally(remote.clone()).await?;
                    report.downloaded += 1;
                }
                ConflictResolution::LocalWins => {
                    self.remote_put(kind, to_remote_shape(local)).await?;
                    self.mark_synced(local.clone()).await?;
                    report.uploaded += 1;
                }
            }
            report.conflicts += 1;
            conflicts.push(entry);
        }

        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Tombstone purge
    // -----------------------------------------------------------------------

    /// Physically remove tombstones older than the retention window from
    /// both stores. Never runs implicitly; callers schedule it.
    pub async fn purge_tombstones(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<PurgeReport, SyncError> {
        if !self.remote.is_reachable().await {
            return Err(SyncError::Offline);
        }
        let _guard = self.guard.lock().await;
        let mut report = PurgeReport::default();

        for kind in EntityKind::DEPENDENCY_ORDER {
            for record in self.local.get_all(kind, &self.account_id).await? {
                if matches!(record.deleted_at, Some(at) if at < cutoff) {
                    self.local
                        .delete(kind, &record.id, &self.account_id)
                        .await?;
                    report.local_purged += 1;
                }
            }
            for (id, doc) in self.remote_get_all(kind).await? {
                let record = from_remote_shape(kind, &doc)?;
                if matches!(record.deleted_at, Some(at) if at < cutoff) {
                    self.remote_delete(kind, &id).await?;
                    report.remote_purged += 1;
                }
            }
        }
        info!(
            local = report.local_purged,
            remote = report.remote_purged,
            "tombstone purge complete"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Store plumbing
    // -----------------------------------------------------------------------

    /// Upsert one record locally as a single write.
    async fn apply_locally(&self, record: Record) -> Result<(), SyncError> {
        match self.local.update(record.clone(), &self.account_id).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                self.local.add(record, &self.account_id).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Flag a local record as in sync with the remote, without touching its
    /// canonical timestamp.
    async fn mark_synced(&self, mut record: Record) -> Result<(), SyncError> {
        if record.sync_status == SyncStatus::Synced {
            return Ok(());
        }
        record.sync_status = SyncStatus::Synced;
        self.local.update(record, &self.account_id).await?;
        Ok(())
    }

    async fn remote_get_all(&self, kind: EntityKind) -> Result<BTreeMap<String, Value>, SyncError> {
        let docs = self
            .remote_call("remote get_all", || {
                self.remote.get_all(kind, &self.account_id)
            })
            .await?;
        let mut by_id = BTreeMap::new();
        for doc in docs {
            match remote_doc_id(&doc) {
                Some(id) => {
                    by_id.insert(id.to_string(), doc);
                }
                None => {
                    return Err(SyncError::MalformedRemote {
                        kind,
                        detail: "document missing id".into(),
                    })
                }
            }
        }
        Ok(by_id)
    }

    /// Write one document to the remote: insert, falling back to update when
    /// the id already exists over there.
    async fn remote_put(&self, kind: EntityKind, doc: Value) -> Result<(), SyncError> {
        let add_result = self
            .remote_call("remote add", || {
                self.remote.add(kind, doc.clone(), &self.account_id)
            })
            .await;
        match add_result {
            Ok(_) => Ok(()),
            Err(StoreError::AlreadyExists { .. }) => {
                self.remote_call("remote update", || {
                    self.remote.update(kind, doc.clone(), &self.account_id)
                })
                .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remote_delete(&self, kind: EntityKind, id: &str) -> Result<(), SyncError> {
        self.remote_call("remote delete", || {
            self.remote.delete(kind, id, &self.account_id)
        })
        .await?;
        Ok(())
    }

    /// Bounded timeout + transient retry around one remote call.
    async fn remote_call<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let deadline = self.config.remote_timeout;
        with_retry(self.config.retry, &self.cancel, what, move || {
            let fut = op();
            async move {
                match tokio::time::timeout(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Timeout),
                }
            }
        })
        .await
    }
}
