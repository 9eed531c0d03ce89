use std::sync::Arc;

use fin_ledger::LedgerService;
use fin_schemas::{EntityKind, Money};
use fin_store::{LocalStore, RetryPolicy};
use fin_testkit::{ts, wallet_record, MemoryLocalStore};
use tokio::sync::Mutex;

const ACCT: &str = "acct-1";

async fn balance(local: &MemoryLocalStore, wallet_id: &str) -> Money {
    local
        .get_by_id(EntityKind::Wallet, wallet_id, ACCT)
        .await
        .unwrap()
        .unwrap()
        .as_wallet()
        .unwrap()
        .balance
}

#[tokio::test]
async fn scenario_transfer_then_delete_restores_both_balances() {
    let local = Arc::new(MemoryLocalStore::new());
    local
        .seed(
            vec![
                wallet_record("w-a", "A", 70_000, ts(1)),
                wallet_record("w-b", "B", 0, ts(1)),
            ],
            ACCT,
        )
        .await;
    let svc = LedgerService::new(
        Arc::clone(&local) as Arc<dyn LocalStore>,
        ACCT,
        Arc::new(Mutex::new(())),
    )
        .with_retry_policy(RetryPolicy::immediate(3));

    let rec = svc
        .execute_transfer("w-a", "w-b", Money::from_major(20_000))
        .await
        .unwrap();
    assert_eq!(balance(&local, "w-a").await, Money::from_major(50_000));
    assert_eq!(balance(&local, "w-b").await, Money::from_major(20_000));

    svc.delete_transfer(&rec.id).await.unwrap();
    assert_eq!(balance(&local, "w-a").await, Money::from_major(70_000));
    assert_eq!(balance(&local, "w-b").await, Money::ZERO);

    // The transfer itself survives as a tombstone for sync propagation.
    let stored = local
        .get_by_id(EntityKind::Transfer, &rec.id, ACCT)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_tombstoned());
}
