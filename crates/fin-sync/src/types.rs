use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fin_schemas::{EntityKind, Record};
use fin_store::{RetryPolicy, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Upload,
    Download,
    Bidirectional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Validating,
    Syncing(SyncMode),
    /// Offline; scheduled attempts are cancelled until reconnect.
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A cycle is already in flight on this service.
    AlreadyRunning,
    /// No connectivity; nothing was changed.
    Offline,
    Cancelled,
    /// A remote document could not be translated to the canonical shape.
    MalformedRemote { kind: EntityKind, detail: String },
    Store(StoreError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::AlreadyRunning => write!(f, "sync already in progress"),
            SyncError::Offline => write!(f, "remote store not reachable"),
            SyncError::Cancelled => write!(f, "sync cancelled"),
            SyncError::MalformedRemote { kind, detail } => {
                write!(f, "malformed remote {kind} document: {detail}")
            }
            SyncError::Store(e) => write!(f, "store failure during sync: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::Store(e)
    }
}

/// Which side a conflict resolution kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    LocalWins,
    RemoteWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    LocalTombstoneNewer,
    RemoteTombstoneNewer,
    LocalEditNewer,
    RemoteEditNewer,
    BothTombstonedLocalNewer,
    BothTombstonedRemoteNewer,
    /// Equal instants; the remote side is the deterministic tie-break.
    TimestampTie,
}

/// The envelope facts a conflict was decided on, kept for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub last_modified: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<&Record> for VersionInfo {
    fn from(r: &Record) -> Self {
        Self {
            last_modified: r.last_modified,
            deleted_at: r.deleted_at,
        }
    }
}

/// One resolved conflict. Conflicts are never errors; they are logged and
/// reported on the cycle's [`SyncReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub local_version: VersionInfo,
    pub remote_version: VersionInfo,
    pub resolution: ConflictResolution,
    pub reason: ConflictReason,
}

/// Per-entity-kind reconciliation counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    pub kind: EntityKind,
    pub uploaded: usize,
    pub downloaded: usize,
    pub conflicts: usize,
}

impl KindReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            uploaded: 0,
            downloaded: 0,
            conflicts: 0,
        }
    }
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub per_kind: Vec<KindReport>,
    pub conflicts: Vec<ConflictEntry>,
}

impl SyncReport {
    pub fn total_uploaded(&self) -> usize {
        self.per_kind.iter().map(|k| k.uploaded).sum()
    }

    pub fn total_downloaded(&self) -> usize {
        self.per_kind.iter().map(|k| k.downloaded).sum()
    }

    pub fn total_conflicts(&self) -> usize {
        self.per_kind.iter().map(|k| k.conflicts).sum()
    }

    /// True when the cycle moved nothing in either direction.
    pub fn is_noop(&self) -> bool {
        self.total_uploaded() == 0 && self.total_downloaded() == 0
    }
}

/// Tuning knobs for the engine and its background scheduler.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Scheduler interval after a successful cycle.
    pub base_interval: Duration,
    /// Backoff ceiling.
    pub max_interval: Duration,
    /// Consecutive failures before the scheduler self-disables.
    pub max_consecutive_failures: u32,
    /// Deadline for each remote call; overruns count as transient failures.
    pub remote_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(5 * 60),
            max_interval: Duration::from_secs(30 * 60),
            max_consecutive_failures: 5,
            remote_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}
