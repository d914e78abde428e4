//! Persistence gateway: remote keyed store for board snapshots.
//!
//! ARCHITECTURE
//! ============
//! Rows are addressed by `(owner_key, board_index)`. The controller never
//! talks to a gateway directly: every write goes through the per-controller
//! persistence writer (`services::persistence`), which applies operations in
//! issue order and reports failures as user notices.
//!
//! DESIGN
//! ======
//! Board indices are dense. Deleting a board must shift every row above it
//! down by one. `delete_and_shift` has a default implementation built from
//! the primitives (delete, then `compact`), which is not atomic. Backends
//! that can do better override it; `PgGateway` runs it in one transaction.
//! `compact` is idempotent, so it doubles as the repair step for a renumber
//! that failed halfway and as the load-time reconciliation.

pub mod memory;
pub mod postgres;

use crate::frame::ErrorCode;
use crate::owner::OwnerKey;
use crate::snapshot::Snapshot;

pub use memory::MemoryGateway;
pub use postgres::PgGateway;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("no stored board at index {0}")]
    RowNotFound(usize),
    #[error("board index {0} out of storable range")]
    IndexOverflow(usize),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    /// The row was deleted but the rows above it still carry their old
    /// indices. Only a `compact` is needed to finish the operation.
    #[error("board {index} deleted but later boards not renumbered: {source}")]
    Renumber {
        index: usize,
        #[source]
        source: Box<GatewayError>,
    },
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Database(other),
        }
    }
}

impl ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_DATABASE",
            Self::RowNotFound(_) => "E_ROW_NOT_FOUND",
            Self::IndexOverflow(_) => "E_INDEX_OVERFLOW",
            Self::Unavailable(_) => "E_GATEWAY",
            Self::Renumber { source, .. } => source.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Database(_) | Self::Unavailable(_) => true,
            Self::RowNotFound(_) | Self::IndexOverflow(_) => false,
            Self::Renumber { source, .. } => source.retryable(),
        }
    }
}

/// One persisted board as returned by `select_all`.
#[derive(Debug, Clone)]
pub struct StoredBoard {
    pub index: usize,
    pub snapshot: Snapshot,
}

#[async_trait::async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Insert or replace the snapshot stored at `(owner, index)`.
    async fn upsert(&self, owner: &OwnerKey, index: usize, snapshot: &Snapshot) -> Result<(), GatewayError>;

    /// All rows for `owner`, ordered by index ascending.
    async fn select_all(&self, owner: &OwnerKey) -> Result<Vec<StoredBoard>, GatewayError>;

    /// Move the row at `index` to `new_index`.
    async fn update_index(&self, owner: &OwnerKey, index: usize, new_index: usize) -> Result<(), GatewayError>;

    /// Remove the row at `index`. Deleting a missing row is not an error.
    async fn delete(&self, owner: &OwnerKey, index: usize) -> Result<(), GatewayError>;

    /// Delete the row at `index` and renumber every row above it down by one.
    ///
    /// A failed delete changed nothing and is returned as is. A failure
    /// after the delete landed is wrapped in `Renumber`.
    async fn delete_and_shift(&self, owner: &OwnerKey, index: usize) -> Result<(), GatewayError> {
        self.delete(owner, index).await?;
        self.compact(owner)
            .await
            .map_err(|e| GatewayError::Renumber { index, source: Box::new(e) })?;
        Ok(())
    }

    /// Renumber rows so their indices are exactly `0..n`, preserving order.
    /// Returns how many rows moved.
    async fn compact(&self, owner: &OwnerKey) -> Result<usize, GatewayError> {
        let rows = self.select_all(owner).await?;
        let mut moved = 0;
        // Ascending order: a row only ever moves down into a slot already vacated.
        for (position, row) in rows.iter().enumerate() {
            if row.index != position {
                self.update_index(owner, row.index, position).await?;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

/// True when stored indices are exactly `0..rows.len()`.
#[must_use]
pub fn is_contiguous(rows: &[StoredBoard]) -> bool {
    rows.iter().enumerate().all(|(position, row)| row.index == position)
}

pub(crate) fn to_db_index(index: usize) -> Result<i32, GatewayError> {
    i32::try_from(index).map_err(|_| GatewayError::IndexOverflow(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_are_unavailable_others_are_database() {
        assert!(matches!(GatewayError::from(sqlx::Error::PoolTimedOut), GatewayError::Unavailable(_)));
        assert!(matches!(GatewayError::from(sqlx::Error::PoolClosed), GatewayError::Unavailable(_)));
        let err = GatewayError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, GatewayError::Database(_)));
        assert_eq!(err.error_code(), "E_DATABASE");
    }
}
