//! Deletion/edit races resolve on instants: the later one wins.

use std::sync::Arc;
use std::time::Duration;

use fin_schemas::EntityKind;
use fin_store::RetryPolicy;
use fin_store::LocalStore;
use fin_sync::{to_remote_shape, ConflictResolution, SyncConfig, SyncMode, SyncService};
use fin_testkit::{
    category_record, expense_record, ts, wallet_record, MemoryLocalStore, MemoryRemoteStore,
};
use tokio::sync::Mutex;

const ACCT: &str = "acct-1";

fn service(local: Arc<MemoryLocalStore>, remote: Arc<MemoryRemoteStore>) -> SyncService {
    SyncService::new(local, remote, ACCT, Arc::new(Mutex::new(()))).with_config(SyncConfig {
        retry: RetryPolicy::immediate(3),
        remote_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    })
}

async fn seed_shared_referents(local: &MemoryLocalStore, remote: &MemoryRemoteStore) {
    let cat = category_record("cat-1", "Food", ts(10));
    let wal = wallet_record("w-1", "Cash", 1_000, ts(10));
    remote
        .seed(EntityKind::Category, vec![to_remote_shape(&cat)], ACCT)
        .await;
    remote
        .seed(EntityKind::Wallet, vec![to_remote_shape(&wal)], ACCT)
        .await;
    local.seed(vec![cat, wal], ACCT).await;
}

#[tokio::test]
async fn scenario_newer_remote_tombstone_deletes_local_copy() {
    let local = Arc::new(MemoryLocalStore::new());
    let remote = Arc::new(MemoryRemoteStore::new());
    seed_shared_referents(&local, &remote).await;

    // E3 edited locally at t=100, tombstoned remotely at t=200.
    local
        .seed(vec![expense_record("e-3", "w-1", "cat-1", 25, ts(100))], ACCT)
        .await;
    let mut remote_e3 = expense_record("e-3", "w-1", "cat-1", 25, ts(50));
    remote_e3.tombstone(ts(200));
    remote
        .seed(
            EntityKind::Transaction,
            vec![to_remote_shape(&remote_e3)],
            ACCT,
        )
        .await;

    let svc = service(Arc::clone(&local), Arc::clone(&remote));
    let report = svc.sync(SyncMode::Bidirectional).await.unwrap();

    assert_eq!(report.total_conflicts(), 1);
    assert_eq!(report.conflicts[0].resolution, ConflictResolution::RemoteWins);

    let local_e3 = local
        .get_by_id(EntityKind::Transaction, "e-3", ACCT)
        .await
        .unwrap()
        .unwrap();
    assert!(local_e3.is_tombstoned());
    assert_eq!(local_e3.deleted_at, Some(ts(200)));
}

#[tokio::test]
async fn scenario_newer_local_edit_resurrects_remote_tombstone() {
    let local = Arc::new(MemoryLocalStore::new());
    let remote = Arc::new(MemoryRemoteStore::new());
    seed_shared_referents(&local, &remote).await;

    // Tombstoned remotely at t=200, but re-edited locally at t=300.
    local
        .seed(vec![expense_record("e-3", "w-1", "cat-1", 75, ts(300))], ACCT)
        .await;
    let mut remote_e3 = expense_record("e-3", "w-1", "cat-1", 25, ts(50));
    remote_e3.tombstone(ts(200));
    remote
        .seed(
            EntityKind::Transaction,
            vec![to_remote_shape(&remote_e3)],
            ACCT,
        )
        .await;

    let svc = service(Arc::clone(&local), Arc::clone(&remote));
    let report = svc.sync(SyncMode::Bidirectional).await.unwrap();

    assert_eq!(report.total_conflicts(), 1);
    assert_eq!(report.conflicts[0].resolution, ConflictResolution::LocalWins);

    let doc = remote
        .doc(EntityKind::Transaction, "e-3", ACCT)
        .await
        .unwrap();
    assert_eq!(doc["deletedAt"], serde_json::Value::Null);
    assert_eq!(doc["amount"], serde_json::json!("75"));
}
