mod common;

use common::{
    packets_sent_metric, settle, supervisor, target, thread_count_metric, FakeSessionFactory,
    ScriptedInventory, LIST_INTERVAL, POLL_INTERVAL,
};
use std::sync::Arc;
use std::time::Duration;
use zkwatch::daemon::{ShutdownOutcome, ShutdownSignal};
use zkwatch::metrics::MetricsRegistry;

const A: u32 = 101;
const B: u32 = 202;

fn factory() -> FakeSessionFactory {
    let factory = FakeSessionFactory::new();
    factory.set_port(A, "2181");
    factory.set_port(B, "2182");
    factory
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_converges_to_inventory() {
    let inventory = ScriptedInventory::new(vec![target(A), target(B)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let mut supervisor = supervisor(inventory, &factory, &registry, &ShutdownSignal::new());

    let summary = supervisor.reconcile_once().await;
    assert_eq!(summary.adopted.len(), 2);
    assert_eq!(supervisor.supervised(), vec![target(A), target(B)]);

    settle().await;
    assert!(registry.contains(&packets_sent_metric("2181")));
    assert!(registry.contains(&packets_sent_metric("2182")));
    assert!(registry.contains(&thread_count_metric("2181")));
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_worker_per_target() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let mut supervisor = supervisor(inventory, &factory, &registry, &ShutdownSignal::new());

    for _ in 0..5 {
        let summary = supervisor.reconcile_once().await;
        assert!(summary.removed.is_empty());
        settle().await;
    }

    assert_eq!(supervisor.supervised(), vec![target(A)]);
    assert_eq!(factory.opened(A), 1);
    assert_eq!(factory.live_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_target_set_changes() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let mut supervisor = supervisor(Arc::clone(&inventory), &factory, &registry, &ShutdownSignal::new());

    let summary = supervisor.reconcile_once().await;
    assert_eq!(summary.adopted, vec![target(A)]);
    settle().await;

    inventory.set(vec![target(A), target(B)]);
    let summary = supervisor.reconcile_once().await;
    assert_eq!(summary.adopted, vec![target(B)]);
    assert!(summary.removed.is_empty());
    settle().await;
    assert_eq!(factory.opened(A), 1);
    assert!(registry.contains(&packets_sent_metric("2181")));
    assert!(registry.contains(&packets_sent_metric("2182")));

    inventory.set(vec![target(B)]);
    let summary = supervisor.reconcile_once().await;
    assert_eq!(summary.removed, vec![target(A)]);
    assert_eq!(supervisor.supervised(), vec![target(B)]);

    assert!(!registry.contains(&packets_sent_metric("2181")));
    assert!(!registry.contains(&thread_count_metric("2181")));
    assert!(registry.contains(&packets_sent_metric("2182")));
    assert_eq!(factory.closed_sessions(), 1);
    assert_eq!(factory.live_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_worker_recreated_after_failed_read() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let mut supervisor = supervisor(inventory, &factory, &registry, &ShutdownSignal::new());

    supervisor.reconcile_once().await;
    settle().await;
    assert!(registry.contains(&packets_sent_metric("2181")));
    assert_eq!(factory.port_reads(A), 1);

    // the next poll fails; the server meanwhile moved to another port
    factory.fail_next_read(A);
    factory.set_port(A, "2281");
    tokio::time::sleep(POLL_INTERVAL).await;
    assert!(registry.is_empty());

    let summary = supervisor.reconcile_once().await;
    assert_eq!(summary.reaped, vec![target(A)]);
    assert!(supervisor.supervised().is_empty());

    let summary = supervisor.reconcile_once().await;
    assert_eq!(summary.adopted, vec![target(A)]);
    settle().await;

    assert_eq!(factory.opened(A), 2);
    assert_eq!(factory.port_reads(A), 2);
    assert!(registry.contains(&packets_sent_metric("2281")));
    assert!(!registry.contains(&packets_sent_metric("2181")));
}

#[tokio::test(start_paused = true)]
async fn test_failed_open_is_readopted_by_running_supervisor() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    factory.fail_opens(A, 1);
    let registry = Arc::new(MetricsRegistry::new());
    let handle = supervisor(inventory, &factory, &registry, &ShutdownSignal::new()).start();

    // one pass adopts and fails, one reaps, one re-adopts
    tokio::time::sleep(LIST_INTERVAL * 2 + Duration::from_millis(500)).await;

    assert_eq!(factory.opened(A), 2);
    assert_eq!(handle.supervised(), vec![target(A)]);
    assert!(registry.contains(&packets_sent_metric("2181")));

    assert_eq!(
        handle.request_shutdown(Duration::from_secs(1)).await,
        ShutdownOutcome::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_workers_and_metrics() {
    let inventory = ScriptedInventory::new(vec![target(A), target(B)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let shutdown = ShutdownSignal::new();
    let handle = supervisor(inventory, &factory, &registry, &shutdown).start();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.supervised().len(), 2);
    assert!(!registry.is_empty());

    let outcome = handle.request_shutdown(Duration::from_secs(1)).await;
    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert!(shutdown.is_signaled());
    assert!(registry.is_empty());
    assert_eq!(factory.live_sessions(), 0);
    assert_eq!(factory.closed_sessions(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_supervised_view_is_empty_after_shutdown() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let shutdown = ShutdownSignal::new();
    let handle = supervisor(inventory, &factory, &registry, &shutdown).start();

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.signal();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(handle.is_finished());
    assert!(handle.supervised().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_inventory_adopts_nothing() {
    let inventory = ScriptedInventory::new(vec![]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let mut supervisor = supervisor(Arc::clone(&inventory), &factory, &registry, &ShutdownSignal::new());

    let summary = supervisor.reconcile_once().await;
    assert!(summary.adopted.is_empty());
    assert!(!summary.inventory_failed);
    assert!(supervisor.supervised().is_empty());
    assert_eq!(inventory.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inventory_failure_keeps_workers() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let mut supervisor = supervisor(Arc::clone(&inventory), &factory, &registry, &ShutdownSignal::new());

    supervisor.reconcile_once().await;
    settle().await;

    inventory.fail_next(1);
    let summary = supervisor.reconcile_once().await;
    assert!(summary.inventory_failed);
    assert!(summary.removed.is_empty());
    assert_eq!(supervisor.supervised(), vec![target(A)]);
    assert!(registry.contains(&packets_sent_metric("2181")));

    let summary = supervisor.reconcile_once().await;
    assert!(!summary.inventory_failed);
    assert_eq!(factory.opened(A), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_adoption_after_shutdown() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    let registry = Arc::new(MetricsRegistry::new());
    let shutdown = ShutdownSignal::new();
    let mut supervisor = supervisor(inventory, &factory, &registry, &shutdown);

    shutdown.signal();
    let summary = supervisor.reconcile_once().await;
    assert!(summary.adopted.is_empty());
    assert!(supervisor.supervised().is_empty());
    assert_eq!(factory.opened(A), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_worker_is_aborted() {
    let inventory = ScriptedInventory::new(vec![target(A)]);
    let factory = factory();
    factory.hang(A);
    let registry = Arc::new(MetricsRegistry::new());
    let mut supervisor = supervisor(Arc::clone(&inventory), &factory, &registry, &ShutdownSignal::new());

    supervisor.reconcile_once().await;
    settle().await;
    assert_eq!(factory.live_sessions(), 1);

    inventory.set(vec![]);
    let summary = supervisor.reconcile_once().await;
    assert_eq!(summary.removed, vec![target(A)]);
    assert!(supervisor.supervised().is_empty());

    // the aborted task dropped its session without closing it
    assert_eq!(factory.live_sessions(), 0);
    assert_eq!(factory.closed_sessions(), 0);
    assert!(registry.is_empty());
}
