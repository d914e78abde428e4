//! In-process gateway.
//!
//! Used when no `DATABASE_URL` is configured (boards then live only as long
//! as the process) and as the test double for the controller and writer.
//! Test builds record every call and can schedule failures per operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{GatewayError, PersistenceGateway, StoredBoard};
use crate::owner::OwnerKey;
use crate::snapshot::Snapshot;

/// Gateway operation a test can schedule failures for.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    Upsert,
    SelectAll,
    UpdateIndex,
    Delete,
}

/// A recorded gateway call.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Upsert { index: usize },
    SelectAll,
    UpdateIndex { index: usize, new_index: usize },
    Delete { index: usize },
}

#[derive(Default)]
struct Inner {
    rows: HashMap<OwnerKey, BTreeMap<usize, Snapshot>>,
    #[cfg(test)]
    calls: Vec<GatewayCall>,
    #[cfg(test)]
    failures: HashMap<GatewayOp, usize>,
}

#[cfg(test)]
impl Inner {
    /// Record `call` and consume a scheduled failure of `op`, if any.
    fn intercept(&mut self, op: GatewayOp, call: GatewayCall) -> Result<(), GatewayError> {
        self.calls.push(call);
        if let Some(remaining) = self.failures.get_mut(&op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(GatewayError::Unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-call; the map is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl MemoryGateway {
    /// Pre-populate rows for an owner, e.g. a room that already has boards.
    pub fn seed(&self, owner: &OwnerKey, rows: impl IntoIterator<Item = (usize, Snapshot)>) {
        let mut inner = self.lock();
        inner.rows.entry(owner.clone()).or_default().extend(rows);
    }

    /// Make the next `times` calls of `op` fail.
    pub fn fail_next(&self, op: GatewayOp, times: usize) {
        *self.lock().failures.entry(op).or_default() += times;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Stored `(index, snapshot)` pairs for an owner in index order.
    pub fn rows(&self, owner: &OwnerKey) -> Vec<(usize, Snapshot)> {
        self.lock()
            .rows
            .get(owner)
            .map(|rows| rows.iter().map(|(i, s)| (*i, s.clone())).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn upsert(&self, owner: &OwnerKey, index: usize, snapshot: &Snapshot) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        #[cfg(test)]
        inner.intercept(GatewayOp::Upsert, GatewayCall::Upsert { index })?;
        inner.rows.entry(owner.clone()).or_default().insert(index, snapshot.clone());
        Ok(())
    }

    async fn select_all(&self, owner: &OwnerKey) -> Result<Vec<StoredBoard>, GatewayError> {
        #[cfg_attr(not(test), allow(unused_mut))]
        let mut inner = self.lock();
        #[cfg(test)]
        inner.intercept(GatewayOp::SelectAll, GatewayCall::SelectAll)?;
        Ok(inner
            .rows
            .get(owner)
            .map(|rows| {
                rows.iter()
                    .map(|(index, snapshot)| StoredBoard { index: *index, snapshot: snapshot.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_index(&self, owner: &OwnerKey, index: usize, new_index: usize) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        #[cfg(test)]
        inner.intercept(GatewayOp::UpdateIndex, GatewayCall::UpdateIndex { index, new_index })?;
        let rows = inner.rows.entry(owner.clone()).or_default();
        let Some(snapshot) = rows.remove(&index) else {
            return Err(GatewayError::RowNotFound(index));
        };
        rows.insert(new_index, snapshot);
        Ok(())
    }

    async fn delete(&self, owner: &OwnerKey, index: usize) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        #[cfg(test)]
        inner.intercept(GatewayOp::Delete, GatewayCall::Delete { index })?;
        if let Some(rows) = inner.rows.get_mut(owner) {
            rows.remove(&index);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
