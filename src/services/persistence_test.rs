use super::*;
use crate::gateway::memory::{GatewayCall, GatewayOp};
use crate::gateway::{MemoryGateway, PersistenceGateway};
use serde_json::json;
use tokio::time::{Duration, timeout};

fn fast_config() -> PersistConfig {
    PersistConfig { queue_capacity: 16, renumber_retries: 3, renumber_retry_base_ms: 1 }
}

fn tagged(n: usize) -> Snapshot {
    Snapshot::new(json!({ "n": n }))
}

async fn recv_notice(rx: &mut mpsc::Receiver<Notice>) -> Notice {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("notice receive timed out")
        .expect("notice channel closed")
}

fn writer(gateway: &Arc<MemoryGateway>, owner: &OwnerKey) -> (PersistQueue, mpsc::Receiver<Notice>) {
    let (notice_tx, notice_rx) = mpsc::channel(NOTICE_CAPACITY);
    let shared: Arc<dyn PersistenceGateway> = gateway.clone();
    let (queue, _handle) = spawn_writer(shared, owner.clone(), fast_config(), notice_tx);
    (queue, notice_rx)
}

#[tokio::test]
async fn operations_apply_in_issue_order() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = OwnerKey::anonymous();
    gateway.seed(&owner, (0..3).map(|i| (i, tagged(i))));
    let (queue, _notices) = writer(&gateway, &owner);

    queue.enqueue(PersistOp::DeleteAndShift { index: 0 });
    queue.enqueue(PersistOp::Upsert { index: 1, snapshot: tagged(9) });
    queue.flush().await;

    assert_eq!(remote_tags(&gateway, &owner), vec![(0, 1), (1, 9)]);
}

#[tokio::test]
async fn upsert_failure_emits_notice() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = OwnerKey::anonymous();
    gateway.fail_next(GatewayOp::Upsert, 1);
    let (queue, mut notices) = writer(&gateway, &owner);

    queue.enqueue(PersistOp::Upsert { index: 2, snapshot: tagged(1) });
    let notice = recv_notice(&mut notices).await;
    assert_eq!(notice.code, "E_GATEWAY");
    assert!(notice.message.starts_with("failed to save board 3"));
    assert!(gateway.rows(&owner).is_empty());
}

fn remote_tags(gateway: &MemoryGateway, owner: &OwnerKey) -> Vec<(usize, u64)> {
    gateway
        .rows(owner)
        .into_iter()
        .map(|(i, s)| (i, s.doc()["n"].as_u64().unwrap()))
        .collect()
}

#[tokio::test]
async fn failed_renumber_is_repaired_without_notice() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = OwnerKey::anonymous();
    gateway.seed(&owner, (0..3).map(|i| (i, tagged(i))));
    gateway.fail_next(GatewayOp::UpdateIndex, 1);
    let (queue, mut notices) = writer(&gateway, &owner);

    queue.enqueue(PersistOp::DeleteAndShift { index: 0 });
    queue.flush().await;

    assert_eq!(remote_tags(&gateway, &owner), vec![(0, 1), (1, 2)]);
    let deletes = gateway.calls().iter().filter(|c| matches!(c, GatewayCall::Delete { .. })).count();
    assert_eq!(deletes, 1);
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn failed_delete_is_retried_before_renumbering() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = OwnerKey::anonymous();
    gateway.seed(&owner, (0..3).map(|i| (i, tagged(i))));
    gateway.fail_next(GatewayOp::Delete, 1);
    let (queue, mut notices) = writer(&gateway, &owner);

    queue.enqueue(PersistOp::DeleteAndShift { index: 1 });
    queue.enqueue(PersistOp::Upsert { index: 1, snapshot: tagged(99) });
    queue.flush().await;

    // Board 2 moved into slot 1 before the upsert landed on it.
    assert_eq!(remote_tags(&gateway, &owner), vec![(0, 0), (1, 99)]);
    let deletes = gateway.calls().iter().filter(|c| matches!(c, GatewayCall::Delete { index: 1 })).count();
    assert_eq!(deletes, 2);
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn exhausted_delete_retries_are_reported_without_renumbering() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = OwnerKey::anonymous();
    gateway.seed(&owner, (0..3).map(|i| (i, tagged(i))));
    gateway.fail_next(GatewayOp::Delete, 10);
    let (queue, mut notices) = writer(&gateway, &owner);

    queue.enqueue(PersistOp::DeleteAndShift { index: 1 });
    queue.flush().await;

    let notice = recv_notice(&mut notices).await;
    assert_eq!(notice.code, "E_GATEWAY");
    assert!(notice.retryable);
    assert!(notice.message.starts_with("failed to delete board 2"));
    let calls = gateway.calls();
    assert_eq!(calls.iter().filter(|c| matches!(c, GatewayCall::Delete { .. })).count(), 3);
    assert!(!calls.iter().any(|c| matches!(c, GatewayCall::UpdateIndex { .. })));
    assert_eq!(remote_tags(&gateway, &owner), vec![(0, 0), (1, 1), (2, 2)]);
}

#[tokio::test]
async fn exhausted_renumber_retries_are_reported() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = OwnerKey::anonymous();
    gateway.seed(&owner, [(0, tagged(0)), (2, tagged(2))]);
    gateway.fail_next(GatewayOp::UpdateIndex, 10);
    let (queue, mut notices) = writer(&gateway, &owner);

    queue.enqueue(PersistOp::Compact);
    queue.flush().await;

    let notice = recv_notice(&mut notices).await;
    assert!(notice.message.starts_with("saved boards may be out of order"));
    let attempts = gateway
        .calls()
        .iter()
        .filter(|c| matches!(c, GatewayCall::UpdateIndex { .. }))
        .count();
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn writer_drains_queue_after_sender_drops() {
    let gateway = Arc::new(MemoryGateway::new());
    let owner = OwnerKey::anonymous();
    let (notice_tx, _notice_rx) = mpsc::channel(NOTICE_CAPACITY);
    let shared: Arc<dyn PersistenceGateway> = gateway.clone();
    let (queue, handle) = spawn_writer(shared, owner.clone(), fast_config(), notice_tx);

    for i in 0..5 {
        queue.enqueue(PersistOp::Upsert { index: i, snapshot: tagged(i) });
    }
    drop(queue);

    timeout(Duration::from_millis(500), handle)
        .await
        .expect("writer should exit once drained")
        .expect("writer task should not panic");
    assert_eq!(gateway.rows(&owner).len(), 5);
}

#[tokio::test]
async fn full_queue_drops_write_with_notice() {
    let (tx, _rx) = mpsc::channel::<PersistOp>(1);
    let (notice_tx, mut notice_rx) = mpsc::channel(NOTICE_CAPACITY);
    let queue = PersistQueue { tx, notices: notice_tx };

    queue.enqueue(PersistOp::Compact);
    queue.enqueue(PersistOp::Compact);

    let notice = recv_notice(&mut notice_rx).await;
    assert_eq!(notice.code, "E_PERSIST_QUEUE");
}
