//! Conflict detection and resolution.
//!
//! Pure and deterministic: the same pair of versions always produces the
//! same winner, on every device, in any order of discovery. Resolution is
//! whole-record last-writer-wins; there is no field-level merging.

use fin_schemas::Record;

use crate::{ConflictReason, ConflictResolution};

/// Whether a present-in-both pair actually needs resolution.
///
/// Bookkeeping fields (`sync_status`, `last_modified`) do not make a
/// conflict on their own: only differing payloads or differing tombstone
/// state do.
pub fn records_conflict(local: &Record, remote: &Record) -> bool {
    if local.is_tombstoned() != remote.is_tombstoned() {
        return true;
    }
    if local.is_tombstoned() && remote.is_tombstoned() {
        // Deleted on both sides: content no longer matters.
        return false;
    }
    local.payload != remote.payload
}

/// Decide the winner of a conflicting pair.
///
/// Order of rules:
/// 1. Exactly one side tombstoned: the tombstone instant competes with the
///    other side's `last_modified`; the later instant wins. A later edit
///    resurrects a deleted record; a later deletion beats an older edit.
///    Equal instants keep the deletion.
/// 2. Both tombstoned: the later tombstone wins (a no-op either way).
/// 3. Neither tombstoned: the later `last_modified` wins; on a tie the
///    remote side wins.
pub fn resolve(local: &Record, remote: &Record) -> (ConflictResolution, ConflictReason) {
    match (local.deleted_at, remote.deleted_at) {
        (Some(local_tomb), None) => {
            if remote.last_modified > local_tomb {
                (ConflictResolution::RemoteWins, ConflictReason::RemoteEditNewer)
            } else {
                (ConflictResolution::LocalWins, ConflictReason::LocalTombstoneNewer)
            }
        }
        (None, Some(remote_tomb)) => {
            if local.last_modified > remote_tomb {
                (ConflictResolution::LocalWins, ConflictReason::LocalEditNewer)
            } else {
                (ConflictResolution::RemoteWins, ConflictReason::RemoteTombstoneNewer)
            }
        }
        (Some(local_tomb), Some(remote_tomb)) => {
            if local_tomb > remote_tomb {
                (
                    ConflictResolution::LocalWins,
                    ConflictReason::BothTombstonedLocalNewer,
                )
            } else {
                (
                    ConflictResolution::RemoteWins,
                    ConflictReason::BothTombstonedRemoteNewer,
                )
            }
        }
        (None, None) => {
            if local.last_modified > remote.last_modified {
                (ConflictResolution::LocalWins, ConflictReason::LocalEditNewer)
            } else if remote.last_modified > local.last_modified {
                (ConflictResolution::RemoteWins, ConflictReason::RemoteEditNewer)
            } else {
                (ConflictResolution::RemoteWins, ConflictReason::TimestampTie)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fin_testkit::{ts, wallet_record};

    fn live(at: i64) -> Record {
        wallet_record("w-1", "Cash", 100, ts(at))
    }

    fn tombstoned(edited: i64, deleted: i64) -> Record {
        let mut r = live(edited);
        r.tombstone(ts(deleted));
        r
    }

    fn edited(at: i64, balance: i64) -> Record {
        wallet_record("w-1", "Cash", balance, ts(at))
    }

    #[test]
    fn later_local_edit_wins() {
        let (res, reason) = resolve(&live(200), &live(100));
        assert_eq!(res, ConflictResolution::LocalWins);
        assert_eq!(reason, ConflictReason::LocalEditNewer);
    }

    #[test]
    fn later_remote_edit_wins() {
        let (res, reason) = resolve(&live(100), &live(200));
        assert_eq!(res, ConflictResolution::RemoteWins);
        assert_eq!(reason, ConflictReason::RemoteEditNewer);
    }

    #[test]
    fn equal_timestamps_remote_wins() {
        let (res, reason) = resolve(&live(100), &live(100));
        assert_eq!(res, ConflictResolution::RemoteWins);
        assert_eq!(reason, ConflictReason::TimestampTie);
    }

    #[test]
    fn later_remote_tombstone_beats_older_local_edit() {
        let (res, reason) = resolve(&live(100), &tombstoned(50, 200));
        assert_eq!(res, ConflictResolution::RemoteWins);
        assert_eq!(reason, ConflictReason::RemoteTombstoneNewer);
    }

    #[test]
    fn later_local_edit_resurrects_remote_tombstone() {
        let (res, reason) = resolve(&live(300), &tombstoned(50, 200));
        assert_eq!(res, ConflictResolution::LocalWins);
        assert_eq!(reason, ConflictReason::LocalEditNewer);
    }

    #[test]
    fn later_local_tombstone_beats_older_remote_edit() {
        let (res, reason) = resolve(&tombstoned(50, 200), &live(100));
        assert_eq!(res, ConflictResolution::LocalWins);
        assert_eq!(reason, ConflictReason::LocalTombstoneNewer);
    }

    #[test]
    fn tombstone_kept_on_equal_instants() {
        let (res, _) = resolve(&tombstoned(50, 100), &live(100));
        assert_eq!(res, ConflictResolution::LocalWins);
        let (res, _) = resolve(&live(100), &tombstoned(50, 100));
        assert_eq!(res, ConflictResolution::RemoteWins);
    }

    #[test]
    fn both_tombstoned_later_wins() {
        let (res, reason) = resolve(&tombstoned(10, 300), &tombstoned(10, 200));
        assert_eq!(res, ConflictResolution::LocalWins);
        assert_eq!(reason, ConflictReason::BothTombstonedLocalNewer);

        let (res, _) = resolve(&tombstoned(10, 200), &tombstoned(10, 300));
        assert_eq!(res, ConflictResolution::RemoteWins);
    }

    #[test]
    fn resolution_is_deterministic() {
        let l = tombstoned(50, 200);
        let r = live(100);
        for _ in 0..10 {
            assert_eq!(resolve(&l, &r), resolve(&l, &r));
        }
    }

    #[test]
    fn identical_payloads_do_not_conflict() {
        assert!(!records_conflict(&live(100), &live(200)));
    }

    #[test]
    fn differing_payloads_conflict() {
        assert!(records_conflict(&edited(100, 10), &edited(100, 20)));
    }

    #[test]
    fn tombstone_state_mismatch_conflicts() {
        assert!(records_conflict(&live(100), &tombstoned(50, 60)));
    }

    #[test]
    fn both_tombstoned_never_conflicts() {
        assert!(!records_conflict(&tombstoned(10, 20), &tombstoned(10, 90)));
    }
}
