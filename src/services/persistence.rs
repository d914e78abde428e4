//! Persistence writer: ordered, fire-and-forget remote writes.
//!
//! DESIGN
//! ======
//! Each controller owns one writer task fed by a bounded queue. The task
//! applies operations strictly in the order they were enqueued, so an upsert
//! for board 2 issued after a delete of board 1 lands on the renumbered row
//! rather than racing the renumber.
//!
//! When the controller goes away the queue sender is dropped; the writer
//! keeps draining what was already enqueued and then exits. In-flight writes
//! are never cancelled.
//!
//! ERROR HANDLING
//! ==============
//! In-memory history is authoritative. A failed write is logged and turned
//! into a `Notice` for the client; nothing is rolled back. Deletes are the
//! exception, since a missed delete leaves remote indices out of step with
//! the board set and every later upsert would land on the wrong row. A
//! delete that did not happen is retried as a whole with back-off. A delete
//! that happened but left later rows unshifted (`GatewayError::Renumber`)
//! only needs the idempotent `compact`, which is retried the same way.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PersistConfig;
use crate::frame::ErrorCode;
use crate::gateway::{GatewayError, PersistenceGateway};
use crate::owner::OwnerKey;
use crate::snapshot::Snapshot;

/// Notice capacity per connection. Notices beyond this are dropped.
pub const NOTICE_CAPACITY: usize = 32;

/// A remote write requested by the controller.
#[derive(Debug)]
pub enum PersistOp {
    Upsert { index: usize, snapshot: Snapshot },
    DeleteAndShift { index: usize },
    /// Renumber rows to `0..n` (load-time reconciliation).
    Compact,
    /// Acknowledged once every earlier operation has been applied.
    Flush(oneshot::Sender<()>),
}

/// User-visible, non-fatal failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub code: &'static str,
    pub message: String,
    /// Whether repeating the user action may succeed.
    pub retryable: bool,
}

impl Notice {
    fn from_error(context: &str, err: &GatewayError) -> Self {
        Self { code: err.error_code(), message: format!("{context}: {err}"), retryable: err.retryable() }
    }
}

/// Sending half of a writer queue.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::Sender<PersistOp>,
    notices: mpsc::Sender<Notice>,
}

impl PersistQueue {
    /// Enqueue without waiting. A full or closed queue drops the write and
    /// tells the user their change was not saved.
    pub fn enqueue(&self, op: PersistOp) {
        let err = match self.tx.try_send(op) {
            Ok(()) => return,
            Err(err) => err,
        };
        let (reason, op) = match err {
            mpsc::error::TrySendError::Full(op) => ("full", op),
            mpsc::error::TrySendError::Closed(op) => ("closed", op),
        };
        warn!(?op, reason, "persist queue unavailable; dropping write");
        notify(
            &self.notices,
            Notice {
                code: "E_PERSIST_QUEUE",
                message: format!("change not saved: persistence queue {reason}"),
                retryable: true,
            },
        );
    }

    /// Wait until every operation enqueued so far has been applied.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistOp::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

/// Spawn the writer for one owner key. Returns the queue and the task handle.
pub fn spawn_writer(
    gateway: Arc<dyn PersistenceGateway>,
    owner: OwnerKey,
    config: PersistConfig,
    notices: mpsc::Sender<Notice>,
) -> (PersistQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<PersistOp>(config.queue_capacity.max(1));
    let writer_notices = notices.clone();

    let handle = tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            apply(gateway.as_ref(), &owner, config, &writer_notices, op).await;
        }
        debug!(%owner, "persistence writer drained");
    });

    (PersistQueue { tx, notices }, handle)
}

async fn apply(
    gateway: &dyn PersistenceGateway,
    owner: &OwnerKey,
    config: PersistConfig,
    notices: &mpsc::Sender<Notice>,
    op: PersistOp,
) {
    match op {
        PersistOp::Upsert { index, snapshot } => {
            if let Err(e) = gateway.upsert(owner, index, &snapshot).await {
                error!(error = %e, %owner, index, "board save failed");
                notify(notices, Notice::from_error(&format!("failed to save board {}", index + 1), &e));
            }
        }
        PersistOp::DeleteAndShift { index } => delete_with_retry(gateway, owner, index, config, notices).await,
        PersistOp::Compact => compact_with_retry(gateway, owner, config, notices).await,
        PersistOp::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}

async fn delete_with_retry(
    gateway: &dyn PersistenceGateway,
    owner: &OwnerKey,
    index: usize,
    config: PersistConfig,
    notices: &mpsc::Sender<Notice>,
) {
    let attempts = config.renumber_retries.max(1);
    for attempt in 1..=attempts {
        match gateway.delete_and_shift(owner, index).await {
            Ok(()) => {
                info!(%owner, index, "deleted board row");
                return;
            }
            Err(GatewayError::Renumber { source, .. }) => {
                warn!(error = %source, %owner, index, "board row deleted but not renumbered; compacting");
                compact_with_retry(gateway, owner, config, notices).await;
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(error = %e, %owner, index, attempt, total = attempts, "board delete failed; retrying");
                tokio::time::sleep(config.retry_delay(attempt)).await;
            }
            Err(e) => {
                error!(error = %e, %owner, index, "board delete failed after retries");
                notify(notices, Notice::from_error(&format!("failed to delete board {}", index + 1), &e));
            }
        }
    }
}

async fn compact_with_retry(
    gateway: &dyn PersistenceGateway,
    owner: &OwnerKey,
    config: PersistConfig,
    notices: &mpsc::Sender<Notice>,
) {
    let attempts = config.renumber_retries.max(1);
    for attempt in 1..=attempts {
        match gateway.compact(owner).await {
            Ok(moved) => {
                if moved > 0 {
                    info!(%owner, moved, "renumbered board rows");
                }
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(error = %e, %owner, attempt, total = attempts, "board renumber failed; retrying");
                tokio::time::sleep(config.retry_delay(attempt)).await;
            }
            Err(e) => {
                error!(error = %e, %owner, "board renumber failed after retries");
                notify(notices, Notice::from_error("saved boards may be out of order", &e));
            }
        }
    }
}

fn notify(notices: &mpsc::Sender<Notice>, notice: Notice) {
    // Best-effort: a gone or saturated client simply misses the notice.
    let _ = notices.try_send(notice);
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
