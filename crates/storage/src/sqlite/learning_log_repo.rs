use chrono::{DateTime, Utc};
use coach_core::model::LearningLog;

use super::SqliteRepository;
use super::mapping::{conn, map_log_row};
use crate::repository::{LearningLogRepository, StorageError};

#[async_trait::async_trait]
impl LearningLogRepository for SqliteRepository {
    async fn append_log(&self, log: &LearningLog) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO learning_logs (resource_id, action, duration_minutes, logged_at, score)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(log.resource_id.as_ref().map(|id| id.as_str().to_owned()))
        .bind(log.action.as_str())
        .bind(log.duration_minutes)
        .bind(log.logged_at)
        .bind(log.score.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn logs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LearningLog>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT resource_id, action, duration_minutes, logged_at, score
                FROM learning_logs
                ORDER BY logged_at ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        // timestamps are compared after decoding; stored text may vary in precision
        let mut out = Vec::new();
        for row in &rows {
            let log = map_log_row(row)?;
            if log.logged_at >= from && log.logged_at < to {
                out.push(log);
            }
        }
        Ok(out)
    }
}
