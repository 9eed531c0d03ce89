//! Download-mode replacement semantics and the tombstone purge sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use fin_schemas::{EntityKind, SyncStatus};
use fin_store::{LocalStore, RetryPolicy};
use fin_sync::{to_remote_shape, SyncConfig, SyncMode, SyncService};
use fin_testkit::{category_record, ts, wallet_record, MemoryLocalStore, MemoryRemoteStore};
use tokio::sync::Mutex;

const ACCT: &str = "acct-1";

fn service(local: Arc<MemoryLocalStore>, remote: Arc<MemoryRemoteStore>) -> SyncService {
    SyncService::new(local, remote, ACCT, Arc::new(Mutex::new(()))).with_config(SyncConfig {
        retry: RetryPolicy::immediate(3),
        remote_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    })
}

#[tokio::test]
async fn download_replaces_local_collection_but_keeps_pending_uploads() {
    let local = Arc::new(MemoryLocalStore::new());
    let remote = Arc::new(MemoryRemoteStore::new());

    // Remote holds one live category and one tombstoned one.
    let keep = category_record("cat-keep", "Food", ts(10));
    let mut gone = category_record("cat-gone", "Old", ts(10));
    gone.tombstone(ts(20));
    remote
        .seed(
            EntityKind::Category,
            vec![to_remote_shape(&keep), to_remote_shape(&gone)],
            ACCT,
        )
        .await;

    // Local: a synced copy of the tombstoned one (must be removed), a stale
    // synced stray (must be removed), and an offline creation (must stay).
    let mut stale_copy = category_record("cat-gone", "Old", ts(10));
    stale_copy.sync_status = SyncStatus::Synced;
    let mut stray = category_record("cat-stray", "Stray", ts(5));
    stray.sync_status = SyncStatus::Synced;
    let fresh = category_record("cat-new", "Brand new", ts(30));
    local.seed(vec![stale_copy, stray, fresh], ACCT).await;

    let svc = service(Arc::clone(&local), Arc::clone(&remote));
    svc.sync(SyncMode::Download).await.unwrap();

    let mut ids: Vec<String> = local
        .get_all(EntityKind::Category, ACCT)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    ids.sort();
    assert_eq!(ids, ["cat-keep", "cat-new"]);
}

#[tokio::test]
async fn purge_removes_only_expired_tombstones_from_both_stores() {
    let local = Arc::new(MemoryLocalStore::new());
    let remote = Arc::new(MemoryRemoteStore::new());

    let mut old_tomb = wallet_record("w-old", "Old", 0, ts(100));
    old_tomb.tombstone(ts(1_000));
    let mut fresh_tomb = wallet_record("w-fresh", "Fresh", 0, ts(100));
    fresh_tomb.tombstone(ts(9_000));
    let live = wallet_record("w-live", "Live", 10, ts(100));

    local
        .seed(
            vec![old_tomb.clone(), fresh_tomb.clone(), live.clone()],
            ACCT,
        )
        .await;
    remote
        .seed(
            EntityKind::Wallet,
            vec![
                to_remote_shape(&old_tomb),
                to_remote_shape(&fresh_tomb),
                to_remote_shape(&live),
            ],
            ACCT,
        )
        .await;

    let svc = service(Arc::clone(&local), Arc::clone(&remote));
    // Everything tombstoned before t=5000 is past retention.
    let cutoff = ts(9_000) - ChronoDuration::seconds(4_000);
    let report = svc.purge_tombstones(cutoff).await.unwrap();

    assert_eq!(report.local_purged, 1);
    assert_eq!(report.remote_purged, 1);
    assert!(local
        .get_by_id(EntityKind::Wallet, "w-old", ACCT)
        .await
        .unwrap()
        .is_none());
    assert!(local
        .get_by_id(EntityKind::Wallet, "w-fresh", ACCT)
        .await
        .unwrap()
        .is_some());
    assert!(remote.doc(EntityKind::Wallet, "w-old", ACCT).await.is_none());
    assert!(remote.doc(EntityKind::Wallet, "w-live", ACCT).await.is_some());
}
