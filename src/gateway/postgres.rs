//! Postgres-backed gateway over the `board_snapshots` table.

use sqlx::PgPool;

use super::{GatewayError, PersistenceGateway, StoredBoard, to_db_index};
use crate::owner::OwnerKey;
use crate::snapshot::Snapshot;

#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for PgGateway {
    async fn upsert(&self, owner: &OwnerKey, index: usize, snapshot: &Snapshot) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO board_snapshots (owner_key, board_index, snapshot, updated_at)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (owner_key, board_index) DO UPDATE SET
                 snapshot = EXCLUDED.snapshot, updated_at = now()",
        )
        .bind(owner.as_str())
        .bind(to_db_index(index)?)
        .bind(snapshot.doc())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select_all(&self, owner: &OwnerKey) -> Result<Vec<StoredBoard>, GatewayError> {
        let rows = sqlx::query_as::<_, (i32, Option<serde_json::Value>)>(
            "SELECT board_index, snapshot
             FROM board_snapshots
             WHERE owner_key = $1
             ORDER BY board_index ASC",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        // Negative indices can only come from an interrupted manual edit; skip them.
        Ok(rows
            .into_iter()
            .filter_map(|(index, doc)| {
                let index = usize::try_from(index).ok()?;
                Some(StoredBoard { index, snapshot: Snapshot::from_stored(doc.unwrap_or_default()) })
            })
            .collect())
    }

    async fn update_index(&self, owner: &OwnerKey, index: usize, new_index: usize) -> Result<(), GatewayError> {
        let result = sqlx::query(
            "UPDATE board_snapshots SET board_index = $3, updated_at = now()
             WHERE owner_key = $1 AND board_index = $2",
        )
        .bind(owner.as_str())
        .bind(to_db_index(index)?)
        .bind(to_db_index(new_index)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::RowNotFound(index));
        }
        Ok(())
    }

    async fn delete(&self, owner: &OwnerKey, index: usize) -> Result<(), GatewayError> {
        sqlx::query("DELETE FROM board_snapshots WHERE owner_key = $1 AND board_index = $2")
            .bind(owner.as_str())
            .bind(to_db_index(index)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete and renumber in one transaction. The shift goes through
    /// negative indices so the primary key never sees two rows on one slot.
    async fn delete_and_shift(&self, owner: &OwnerKey, index: usize) -> Result<(), GatewayError> {
        let index = to_db_index(index)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM board_snapshots WHERE owner_key = $1 AND board_index = $2")
            .bind(owner.as_str())
            .bind(index)
            .execute(tx.as_mut())
            .await?;
        sqlx::query(
            "UPDATE board_snapshots SET board_index = -board_index
             WHERE owner_key = $1 AND board_index > $2",
        )
        .bind(owner.as_str())
        .bind(index)
        .execute(tx.as_mut())
        .await?;
        sqlx::query(
            "UPDATE board_snapshots SET board_index = -board_index - 1, updated_at = now()
             WHERE owner_key = $1 AND board_index < 0",
        )
        .bind(owner.as_str())
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
