//! Background scheduler behavior under virtual time.

use std::sync::Arc;
use std::time::Duration;

use fin_store::RetryPolicy;
use fin_sync::{SyncConfig, SyncScheduler, SyncService};
use fin_testkit::{MemoryLocalStore, MemoryRemoteStore};
use tokio::sync::{watch, Mutex};

const ACCT: &str = "acct-1";
const BASE: Duration = Duration::from_secs(5 * 60);

fn service(remote: Arc<MemoryRemoteStore>) -> Arc<SyncService> {
    Arc::new(
        SyncService::new(
            Arc::new(MemoryLocalStore::new()),
            remote,
            ACCT,
            Arc::new(Mutex::new(())),
        )
        .with_config(SyncConfig {
            retry: RetryPolicy::immediate(1),
            remote_timeout: Duration::from_secs(5),
            ..SyncConfig::default()
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn scheduled_sync_fires_after_base_interval() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let (_online_tx, online_rx) = watch::channel(true);
    let handle = SyncScheduler::new(service(Arc::clone(&remote)), online_rx).spawn();

    tokio::time::sleep(BASE + Duration::from_secs(1)).await;
    assert!(remote.read_count() > 0, "no scheduled cycle ran");

    handle.shutdown();
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn offline_pauses_and_reconnect_rearms() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let (online_tx, online_rx) = watch::channel(false);
    let handle = SyncScheduler::new(service(Arc::clone(&remote)), online_rx).spawn();

    // Offline: hours pass, nothing runs.
    tokio::time::sleep(Duration::from_secs(4 * 3600)).await;
    assert_eq!(remote.read_count(), 0);

    // Reconnect: one base interval later the cycle runs.
    online_tx.send(true).unwrap();
    tokio::time::sleep(BASE + Duration::from_secs(1)).await;
    assert!(remote.read_count() > 0);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_disable_until_manual_success() {
    let remote = Arc::new(MemoryRemoteStore::new());
    // Reported online by the platform, but every attempt finds the remote
    // unreachable and fails.
    remote.set_reachable(false);
    let (_online_tx, online_rx) = watch::channel(true);
    let handle = SyncScheduler::new(service(Arc::clone(&remote)), online_rx).spawn();

    // Intervals 5+10+20+30+30 minutes: five failures, then self-disable.
    tokio::time::sleep(Duration::from_secs(96 * 60)).await;
    assert_eq!(remote.read_count(), 0);

    // Healthy again, but the scheduler stays down for hours.
    remote.set_reachable(true);
    tokio::time::sleep(Duration::from_secs(10 * 3600)).await;
    assert_eq!(remote.read_count(), 0, "disabled scheduler still ran");

    // A successful manual sync re-arms it.
    handle.notify_manual_success();
    tokio::time::sleep(BASE + Duration::from_secs(1)).await;
    assert!(remote.read_count() > 0);

    handle.shutdown();
    handle.join().await;
}
