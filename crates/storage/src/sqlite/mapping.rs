use coach_core::model::{
    LearningLog, LearningPath, Nudge, NudgeId, QuizSession, ResourceId, ResourceRecord,
    RetentionScore,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn nudge_id_from_i64(v: i64) -> Result<NudgeId, StorageError> {
    u64::try_from(v)
        .map(NudgeId::new)
        .map_err(|_| StorageError::Serialization("nudge_id sign overflow".into()))
}

pub(crate) fn nudge_id_to_i64(id: NudgeId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("nudge_id overflow".into()))
}

pub(crate) fn map_resource_row(row: &sqlx::sqlite::SqliteRow) -> Result<ResourceRecord, StorageError> {
    let insights_json: String = row.try_get("key_insights").map_err(ser)?;
    let key_insights: Vec<String> = serde_json::from_str(&insights_json).map_err(ser)?;

    let score: i64 = row.try_get("retention_score").map_err(ser)?;

    Ok(ResourceRecord {
        id: ResourceId::new(row.try_get::<String, _>("id").map_err(ser)?),
        title: row.try_get("title").map_err(ser)?,
        learning_status: row
            .try_get::<String, _>("learning_status")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        last_reviewed: row.try_get("last_reviewed").map_err(ser)?,
        next_review: row.try_get("next_review").map_err(ser)?,
        review_count: u32_from_i64("review_count", row.try_get("review_count").map_err(ser)?)?,
        retention_score: RetentionScore::try_from(score).map_err(ser)?,
        abandonment_risk: row
            .try_get::<String, _>("abandonment_risk")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        hours_invested: row.try_get("hours_invested").map_err(ser)?,
        estimated_hours: row.try_get("estimated_hours").map_err(ser)?,
        completion_status: row
            .try_get::<String, _>("completion_status")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        key_insights,
        learning_path: row.try_get("learning_path").map_err(ser)?,
    })
}

pub(crate) fn map_nudge_row(row: &sqlx::sqlite::SqliteRow) -> Result<Nudge, StorageError> {
    let delivered: i64 = row.try_get("delivered").map_err(ser)?;
    Ok(Nudge {
        id: nudge_id_from_i64(row.try_get("id").map_err(ser)?)?,
        resource_id: ResourceId::new(row.try_get::<String, _>("resource_id").map_err(ser)?),
        kind: row
            .try_get::<String, _>("kind")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        message: row.try_get("message").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        delivered: delivered != 0,
        delivered_at: row.try_get("delivered_at").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizSession, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    serde_json::from_str(&payload).map_err(ser)
}

pub(crate) fn map_log_row(row: &sqlx::sqlite::SqliteRow) -> Result<LearningLog, StorageError> {
    let score: Option<i64> = row.try_get("score").map_err(ser)?;
    Ok(LearningLog {
        resource_id: row
            .try_get::<Option<String>, _>("resource_id")
            .map_err(ser)?
            .map(ResourceId::new),
        action: row
            .try_get::<String, _>("action")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        duration_minutes: row.try_get("duration_minutes").map_err(ser)?,
        logged_at: row.try_get("logged_at").map_err(ser)?,
        score: score.map(|s| u8_from_i64("score", s)).transpose()?,
    })
}

pub(crate) fn map_learning_path_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LearningPath, StorageError> {
    Ok(LearningPath {
        name: row.try_get("name").map_err(ser)?,
        weekly_target_hours: row.try_get("weekly_target_hours").map_err(ser)?,
        current_milestone: row.try_get("current_milestone").map_err(ser)?,
        overall_progress: u8_from_i64(
            "overall_progress",
            row.try_get("overall_progress").map_err(ser)?,
        )?,
    })
}
