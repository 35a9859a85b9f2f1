use coach_core::model::{ResourceId, ResourceRecord, ResourceUpdate};
use sqlx::{Executor, Sqlite};

use super::SqliteRepository;
use super::mapping::{conn, map_resource_row, ser};
use crate::repository::{ResourceRepository, StorageError};

const SELECT_RESOURCE: &str = r"
    SELECT
        id, title, learning_status, last_reviewed, next_review, review_count,
        retention_score, abandonment_risk, hours_invested, estimated_hours,
        completion_status, key_insights, learning_path
    FROM resources
";

async fn write_resource<'e, E>(executor: E, record: &ResourceRecord) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let insights = serde_json::to_string(&record.key_insights).map_err(ser)?;

    sqlx::query(
        r"
        INSERT INTO resources (
            id, title, learning_status, last_reviewed, next_review, review_count,
            retention_score, abandonment_risk, hours_invested, estimated_hours,
            completion_status, key_insights, learning_path
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            learning_status = excluded.learning_status,
            last_reviewed = excluded.last_reviewed,
            next_review = excluded.next_review,
            review_count = excluded.review_count,
            retention_score = excluded.retention_score,
            abandonment_risk = excluded.abandonment_risk,
            hours_invested = excluded.hours_invested,
            estimated_hours = excluded.estimated_hours,
            completion_status = excluded.completion_status,
            key_insights = excluded.key_insights,
            learning_path = excluded.learning_path
        ",
    )
    .bind(record.id.as_str())
    .bind(record.title.as_str())
    .bind(record.learning_status.as_str())
    .bind(record.last_reviewed)
    .bind(record.next_review)
    .bind(i64::from(record.review_count))
    .bind(i64::from(record.retention_score.value()))
    .bind(record.abandonment_risk.as_str())
    .bind(record.hours_invested)
    .bind(record.estimated_hours)
    .bind(record.completion_status.as_str())
    .bind(insights)
    .bind(record.learning_path.as_deref())
    .execute(executor)
    .await
    .map_err(conn)?;

    Ok(())
}

#[async_trait::async_trait]
impl ResourceRepository for SqliteRepository {
    async fn active_resources(&self) -> Result<Vec<ResourceRecord>, StorageError> {
        let sql = format!("{SELECT_RESOURCE} WHERE learning_status IN ('active', 'paused') ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_resource_row).collect()
    }

    async fn all_resources(&self) -> Result<Vec<ResourceRecord>, StorageError> {
        let sql = format!("{SELECT_RESOURCE} ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_resource_row).collect()
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<ResourceRecord, StorageError> {
        let sql = format!("{SELECT_RESOURCE} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        map_resource_row(&row)
    }

    async fn upsert_resource(&self, record: &ResourceRecord) -> Result<(), StorageError> {
        write_resource(&self.pool, record).await
    }

    async fn update_resource(
        &self,
        id: &ResourceId,
        update: &ResourceUpdate,
    ) -> Result<ResourceRecord, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let sql = format!("{SELECT_RESOURCE} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let mut record = map_resource_row(&row)?;
        record.apply(update);
        write_resource(&mut *tx, &record).await?;

        tx.commit().await.map_err(conn)?;
        Ok(record)
    }
}
