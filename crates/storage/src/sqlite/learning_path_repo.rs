use chrono::Utc;
use coach_core::model::LearningPath;

use super::SqliteRepository;
use super::mapping::{conn, map_learning_path_row};
use crate::repository::{LearningPathRepository, StorageError};

#[async_trait::async_trait]
impl LearningPathRepository for SqliteRepository {
    async fn learning_path(&self) -> Result<Option<LearningPath>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT name, weekly_target_hours, current_milestone, overall_progress
                FROM learning_paths
                ORDER BY updated_at DESC
                LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_learning_path_row).transpose()
    }

    async fn upsert_learning_path(&self, path: &LearningPath) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO learning_paths (
                    name, weekly_target_hours, current_milestone, overall_progress, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(name) DO UPDATE SET
                    weekly_target_hours = excluded.weekly_target_hours,
                    current_milestone = excluded.current_milestone,
                    overall_progress = excluded.overall_progress,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(path.name.as_str())
        .bind(path.weekly_target_hours)
        .bind(path.current_milestone.as_deref())
        .bind(i64::from(path.overall_progress))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
