use chrono::{DateTime, Utc};
use coach_core::model::{NewNudge, Nudge, NudgeId, ResourceId};

use super::SqliteRepository;
use super::mapping::{conn, map_nudge_row, nudge_id_from_i64, nudge_id_to_i64};
use crate::repository::{NudgeRepository, StorageError};

#[async_trait::async_trait]
impl NudgeRepository for SqliteRepository {
    async fn undelivered_nudge(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Option<Nudge>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, resource_id, kind, message, created_at, delivered, delivered_at
                FROM nudges
                WHERE resource_id = ?1 AND delivered = 0
                LIMIT 1
            ",
        )
        .bind(resource_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_nudge_row).transpose()
    }

    async fn insert_nudge_if_none_pending(
        &self,
        nudge: NewNudge,
    ) -> Result<Option<Nudge>, StorageError> {
        // idx_nudges_one_pending turns a second pending row into a no-op
        let res = sqlx::query(
            r"
                INSERT OR IGNORE INTO nudges (resource_id, kind, message, created_at, delivered)
                VALUES (?1, ?2, ?3, ?4, 0)
            ",
        )
        .bind(nudge.resource_id.as_str())
        .bind(nudge.kind.as_str())
        .bind(nudge.message.as_str())
        .bind(nudge.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }

        let id = nudge_id_from_i64(res.last_insert_rowid())?;
        Ok(Some(nudge.assign_id(id)))
    }

    async fn pending_nudges(&self, limit: Option<usize>) -> Result<Vec<Nudge>, StorageError> {
        // LIMIT -1 means no limit in SQLite
        let limit = match limit {
            Some(n) => i64::try_from(n)
                .map_err(|_| StorageError::Serialization("limit overflow".into()))?,
            None => -1,
        };

        let rows = sqlx::query(
            r"
                SELECT id, resource_id, kind, message, created_at, delivered, delivered_at
                FROM nudges
                WHERE delivered = 0
                ORDER BY created_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_nudge_row).collect()
    }

    async fn mark_delivered(
        &self,
        ids: &[NudgeId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut marked = 0_u64;
        for id in ids {
            let res = sqlx::query(
                r"
                    UPDATE nudges
                    SET delivered = 1, delivered_at = ?1
                    WHERE id = ?2 AND delivered = 0
                ",
            )
            .bind(at)
            .bind(nudge_id_to_i64(*id)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            marked += res.rows_affected();
        }
        tx.commit().await.map_err(conn)?;

        usize::try_from(marked).map_err(|_| StorageError::Serialization("count overflow".into()))
    }
}
