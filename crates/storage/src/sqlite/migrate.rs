use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            learning_status TEXT NOT NULL,
            last_reviewed TEXT,
            next_review TEXT,
            review_count INTEGER NOT NULL CHECK (review_count >= 0),
            retention_score INTEGER NOT NULL CHECK (retention_score BETWEEN 0 AND 100),
            abandonment_risk TEXT NOT NULL,
            hours_invested REAL NOT NULL CHECK (hours_invested >= 0),
            estimated_hours REAL NOT NULL CHECK (estimated_hours >= 0),
            completion_status TEXT NOT NULL,
            key_insights TEXT NOT NULL,
            learning_path TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS nudges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL,
            delivered INTEGER NOT NULL DEFAULT 0 CHECK (delivered IN (0, 1)),
            delivered_at TEXT
        );
    ",
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_nudges_one_pending
            ON nudges(resource_id) WHERE delivered = 0;
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_nudges_pending_created
            ON nudges(delivered, created_at);
    ",
    r"
        CREATE TABLE IF NOT EXISTS quiz_sessions (
            id TEXT PRIMARY KEY,
            resource_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_logs (
            id INTEGER PRIMARY KEY,
            resource_id TEXT,
            action TEXT NOT NULL,
            duration_minutes REAL NOT NULL CHECK (duration_minutes >= 0),
            logged_at TEXT NOT NULL,
            score INTEGER CHECK (score BETWEEN 0 AND 100)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_learning_logs_logged_at
            ON learning_logs(logged_at);
    ",
    r"
        CREATE TABLE IF NOT EXISTS learning_paths (
            name TEXT PRIMARY KEY,
            weekly_target_hours REAL NOT NULL CHECK (weekly_target_hours >= 0),
            current_milestone TEXT,
            overall_progress INTEGER NOT NULL CHECK (overall_progress BETWEEN 0 AND 100),
            updated_at TEXT NOT NULL
        );
    ",
];

/// Runs versioned migrations inside a transaction each.
///
/// Version 1 creates resources, nudges (with the one-pending-per-resource
/// index), quiz sessions, learning logs and learning paths.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
