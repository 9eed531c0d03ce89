//! fin-sync
//!
//! Replication/Sync Engine: reconciles every entity collection between the
//! device-local replica and the remote authoritative store.
//!
//! Architectural decisions:
//! - [`SyncService`] is an explicit instance constructed once at startup and
//!   handed to whoever needs it. No global singleton, no module state.
//! - Exactly one cycle in flight per service; a second request fails fast.
//! - Entity kinds reconcile in dependency order, so a transaction never
//!   lands before the category and wallet it references.
//! - Conflict resolution is pure, deterministic and commutative enough that
//!   re-running a cycle after a crash converges: tombstone instants and
//!   `last_modified` decide, remote wins ties.
//! - Every remote call is bounded by a timeout and the shared transient
//!   retry policy; cancellation is checked between entity kinds and a single
//!   record's resolution is always one local write.

mod engine;
mod resolve;
mod scheduler;
mod shape;
mod types;

pub use engine::{PurgeReport, SyncService, DEFAULT_TOMBSTONE_RETENTION_DAYS};
pub use resolve::{records_conflict, resolve};
pub use scheduler::{BackoffState, SchedulerHandle, SyncScheduler};
pub use shape::{from_remote_shape, to_remote_shape};
pub use types::*;
