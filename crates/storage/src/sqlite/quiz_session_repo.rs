use coach_core::model::{QuizSession, QuizSessionId};

use super::SqliteRepository;
use super::mapping::{conn, map_session_row, ser};
use crate::repository::{QuizSessionRepository, StorageError};

#[async_trait::async_trait]
impl QuizSessionRepository for SqliteRepository {
    async fn save_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let payload = serde_json::to_string(session).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO quiz_sessions (id, resource_id, payload, started_at, completed_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    payload = excluded.payload,
                    completed_at = excluded.completed_at
            ",
        )
        .bind(session.id().to_string())
        .bind(session.resource_id().as_str())
        .bind(payload)
        .bind(session.started_at())
        .bind(session.completed_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_session(&self, id: QuizSessionId) -> Result<QuizSession, StorageError> {
        let row = sqlx::query("SELECT payload FROM quiz_sessions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        map_session_row(&row)
    }
}
