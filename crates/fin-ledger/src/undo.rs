//! Explicit undo stack for compensating rollback.
//!
//! Entries are plain prior-value descriptors pushed before each forward step
//! executes. The stack is data, not closures: it can be inspected in tests
//! and replayed safely regardless of what the failed step left behind.

use fin_schemas::{EntityKind, Record};
use fin_store::{with_retry, LocalStore, RetryPolicy, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Inverse of one forward step, with the pre-step value captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEntry {
    /// The step overwrote `prior` (balance adjustment, payload edit,
    /// tombstone); undo restores the captured record verbatim.
    RestoreRecord { prior: Record },
    /// The step inserted a new record; undo removes it. Tolerates the record
    /// being absent, which is the case when the insert itself was the step
    /// that failed.
    RemoveInserted { kind: EntityKind, id: String },
}

#[derive(Debug, Default)]
pub struct UndoStack {
    entries: Vec<UndoEntry>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    /// Replay every inverse in LIFO order. Stops at the first inverse that
    /// fails; that error is fatal for the operation.
    pub async fn unwind(
        self,
        local: &dyn LocalStore,
        account_id: &str,
        retry: RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        for entry in self.entries.into_iter().rev() {
            match entry {
                UndoEntry::RestoreRecord { prior } => {
                    with_retry(retry, cancel, "rollback: restore record", || {
                        let prior = prior.clone();
                        async move { local.update(prior, account_id).await }
                    })
                    .await?;
                }
                UndoEntry::RemoveInserted { kind, id } => {
                    let result = with_retry(retry, cancel, "rollback: remove inserted", || {
                        let id = id.clone();
                        async move { local.delete(kind, &id, account_id).await }
                    })
                    .await;
                    match result {
                        Ok(_) => {}
                        // The insert never happened; nothing to remove.
                        Err(StoreError::NotFound { .. }) => {
                            warn!(%kind, %id, "rollback target already absent");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }
}
