use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::model::{
    LearningLog, LearningPath, NewNudge, Nudge, NudgeId, QuizSession, QuizSessionId,
    ResourceId, ResourceRecord, ResourceUpdate,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for learning resources.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Resources the engine tracks: learning status `active` or `paused`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn active_resources(&self) -> Result<Vec<ResourceRecord>, StorageError>;

    /// Every stored resource regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn all_resources(&self) -> Result<Vec<ResourceRecord>, StorageError>;

    /// Fetch a resource by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_resource(&self, id: &ResourceId) -> Result<ResourceRecord, StorageError>;

    /// Persist or replace a resource.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the resource cannot be stored.
    async fn upsert_resource(&self, record: &ResourceRecord) -> Result<(), StorageError>;

    /// Apply a field-level update and return the stored result.
    ///
    /// Applying the same risk or status update twice leaves the record unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the resource does not exist.
    async fn update_resource(
        &self,
        id: &ResourceId,
        update: &ResourceUpdate,
    ) -> Result<ResourceRecord, StorageError>;
}

/// Repository contract for nudges.
///
/// Implementations guarantee at most one undelivered nudge per resource.
#[async_trait]
pub trait NudgeRepository: Send + Sync {
    /// The outstanding nudge for a resource, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn undelivered_nudge(&self, resource_id: &ResourceId)
    -> Result<Option<Nudge>, StorageError>;

    /// Store `nudge` unless the resource already has an undelivered one.
    ///
    /// The check and the insert are atomic. Returns `None` when a pending
    /// nudge already exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the nudge cannot be stored.
    async fn insert_nudge_if_none_pending(
        &self,
        nudge: NewNudge,
    ) -> Result<Option<Nudge>, StorageError>;

    /// Undelivered nudges, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn pending_nudges(&self, limit: Option<usize>) -> Result<Vec<Nudge>, StorageError>;

    /// Mark nudges delivered. Returns how many changed state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update fails.
    async fn mark_delivered(&self, ids: &[NudgeId], at: DateTime<Utc>)
    -> Result<usize, StorageError>;
}

#[async_trait]
pub trait QuizSessionRepository: Send + Sync {
    /// Persist or replace a quiz session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn save_session(&self, session: &QuizSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_session(&self, id: QuizSessionId) -> Result<QuizSession, StorageError>;
}

#[async_trait]
pub trait LearningLogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn append_log(&self, log: &LearningLog) -> Result<(), StorageError>;

    /// Entries with `from <= logged_at < to`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn logs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LearningLog>, StorageError>;
}

#[async_trait]
pub trait LearningPathRepository: Send + Sync {
    /// The current learning path, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn learning_path(&self) -> Result<Option<LearningPath>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the path cannot be stored.
    async fn upsert_learning_path(&self, path: &LearningPath) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct NudgeTable {
    next_id: u64,
    rows: Vec<Nudge>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    resources: Arc<Mutex<HashMap<ResourceId, ResourceRecord>>>,
    nudges: Arc<Mutex<NudgeTable>>,
    sessions: Arc<Mutex<HashMap<QuizSessionId, QuizSession>>>,
    logs: Arc<Mutex<Vec<LearningLog>>>,
    path: Arc<Mutex<Option<LearningPath>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn sorted_by_id(map: &HashMap<ResourceId, ResourceRecord>) -> Vec<ResourceRecord> {
    let mut out: Vec<ResourceRecord> = map.values().cloned().collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

#[async_trait]
impl ResourceRepository for InMemoryRepository {
    async fn active_resources(&self) -> Result<Vec<ResourceRecord>, StorageError> {
        let guard = self.resources.lock().map_err(poisoned)?;
        Ok(sorted_by_id(&guard)
            .into_iter()
            .filter(|r| r.learning_status.is_tracked())
            .collect())
    }

    async fn all_resources(&self) -> Result<Vec<ResourceRecord>, StorageError> {
        let guard = self.resources.lock().map_err(poisoned)?;
        Ok(sorted_by_id(&guard))
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<ResourceRecord, StorageError> {
        let guard = self.resources.lock().map_err(poisoned)?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn upsert_resource(&self, record: &ResourceRecord) -> Result<(), StorageError> {
        let mut guard = self.resources.lock().map_err(poisoned)?;
        guard.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_resource(
        &self,
        id: &ResourceId,
        update: &ResourceUpdate,
    ) -> Result<ResourceRecord, StorageError> {
        let mut guard = self.resources.lock().map_err(poisoned)?;
        let record = guard.get_mut(id).ok_or(StorageError::NotFound)?;
        record.apply(update);
        Ok(record.clone())
    }
}

#[async_trait]
impl NudgeRepository for InMemoryRepository {
    async fn undelivered_nudge(
        &self,
        resource_id: &ResourceId,
    ) -> Result<Option<Nudge>, StorageError> {
        let guard = self.nudges.lock().map_err(poisoned)?;
        Ok(guard
            .rows
            .iter()
            .find(|n| !n.delivered && &n.resource_id == resource_id)
            .cloned())
    }

    async fn insert_nudge_if_none_pending(
        &self,
        nudge: NewNudge,
    ) -> Result<Option<Nudge>, StorageError> {
        // held across the check and the insert
        let mut guard = self.nudges.lock().map_err(poisoned)?;
        if guard
            .rows
            .iter()
            .any(|n| !n.delivered && n.resource_id == nudge.resource_id)
        {
            return Ok(None);
        }

        guard.next_id += 1;
        let stored = nudge.assign_id(NudgeId::new(guard.next_id));
        guard.rows.push(stored.clone());
        Ok(Some(stored))
    }

    async fn pending_nudges(&self, limit: Option<usize>) -> Result<Vec<Nudge>, StorageError> {
        let guard = self.nudges.lock().map_err(poisoned)?;
        let mut pending: Vec<Nudge> = guard.rows.iter().filter(|n| !n.delivered).cloned().collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            pending.truncate(limit);
        }
        Ok(pending)
    }

    async fn mark_delivered(
        &self,
        ids: &[NudgeId],
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let mut guard = self.nudges.lock().map_err(poisoned)?;
        let mut marked = 0;
        for nudge in guard.rows.iter_mut() {
            if !nudge.delivered && ids.contains(&nudge.id) {
                nudge.mark_delivered(at);
                marked += 1;
            }
        }
        Ok(marked)
    }
}

#[async_trait]
impl QuizSessionRepository for InMemoryRepository {
    async fn save_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: QuizSessionId) -> Result<QuizSession, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl LearningLogRepository for InMemoryRepository {
    async fn append_log(&self, log: &LearningLog) -> Result<(), StorageError> {
        let mut guard = self.logs.lock().map_err(poisoned)?;
        guard.push(log.clone());
        Ok(())
    }

    async fn logs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LearningLog>, StorageError> {
        let guard = self.logs.lock().map_err(poisoned)?;
        let mut out: Vec<LearningLog> = guard
            .iter()
            .filter(|l| l.logged_at >= from && l.logged_at < to)
            .cloned()
            .collect();
        out.sort_by_key(|l| l.logged_at);
        Ok(out)
    }
}

#[async_trait]
impl LearningPathRepository for InMemoryRepository {
    async fn learning_path(&self) -> Result<Option<LearningPath>, StorageError> {
        let guard = self.path.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn upsert_learning_path(&self, path: &LearningPath) -> Result<(), StorageError> {
        let mut guard = self.path.lock().map_err(poisoned)?;
        *guard = Some(path.clone());
        Ok(())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub resources: Arc<dyn ResourceRepository>,
    pub nudges: Arc<dyn NudgeRepository>,
    pub quiz_sessions: Arc<dyn QuizSessionRepository>,
    pub learning_logs: Arc<dyn LearningLogRepository>,
    pub learning_paths: Arc<dyn LearningPathRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            resources: Arc::new(repo.clone()),
            nudges: Arc::new(repo.clone()),
            quiz_sessions: Arc::new(repo.clone()),
            learning_logs: Arc::new(repo.clone()),
            learning_paths: Arc::new(repo),
        }
    }

    /// Read resources and the learning path from a markdown vault, keeping the
    /// other repositories of `self`.
    #[must_use]
    pub fn with_vault(mut self, vault: crate::vault::VaultRepository) -> Self {
        let vault = Arc::new(vault);
        self.resources = vault.clone();
        self.learning_paths = vault;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::model::{LearningAction, LearningStatus, RiskLevel};
    use coach_core::time::fixed_now;
    use chrono::Duration;

    fn resource(path: &str) -> ResourceRecord {
        ResourceRecord::new(ResourceId::new(path), path)
    }

    #[tokio::test]
    async fn active_resources_skip_untracked_statuses() {
        let repo = InMemoryRepository::new();
        repo.upsert_resource(&resource("a.md")).await.unwrap();
        repo.upsert_resource(&resource("b.md").with_status(LearningStatus::Paused))
            .await
            .unwrap();
        repo.upsert_resource(&resource("c.md").with_status(LearningStatus::Mastered))
            .await
            .unwrap();

        let active = repo.active_resources().await.unwrap();
        let ids: Vec<&str> = active.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a.md", "b.md"]);
        assert_eq!(repo.all_resources().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_missing_resource_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .update_resource(&ResourceId::new("nope.md"), &ResourceUpdate::risk(RiskLevel::High))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn only_one_pending_nudge_per_resource() {
        let repo = InMemoryRepository::new();
        let id = ResourceId::new("a.md");

        let first = repo
            .insert_nudge_if_none_pending(NewNudge::abandonment(id.clone(), "one", fixed_now()))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = repo
            .insert_nudge_if_none_pending(NewNudge::abandonment(id.clone(), "two", fixed_now()))
            .await
            .unwrap();
        assert!(second.is_none());

        let marked = repo
            .mark_delivered(&[first.unwrap().id], fixed_now())
            .await
            .unwrap();
        assert_eq!(marked, 1);
        assert!(repo.undelivered_nudge(&id).await.unwrap().is_none());

        let third = repo
            .insert_nudge_if_none_pending(NewNudge::abandonment(id, "three", fixed_now()))
            .await
            .unwrap();
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn pending_nudges_newest_first_with_limit() {
        let repo = InMemoryRepository::new();
        for (i, path) in ["a.md", "b.md", "c.md"].into_iter().enumerate() {
            let at = fixed_now() + Duration::minutes(i64::try_from(i).unwrap());
            repo.insert_nudge_if_none_pending(NewNudge::abandonment(ResourceId::new(path), path, at))
                .await
                .unwrap();
        }

        let pending = repo.pending_nudges(Some(2)).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|n| n.resource_id.as_str()).collect();
        assert_eq!(ids, ["c.md", "b.md"]);
    }

    #[tokio::test]
    async fn logs_between_is_half_open() {
        let repo = InMemoryRepository::new();
        let start = fixed_now();
        for offset in [0, 30, 60] {
            let log = LearningLog::new(None, LearningAction::Quiz, 10.0, start + Duration::minutes(offset));
            repo.append_log(&log).await.unwrap();
        }
        let logs = repo
            .logs_between(start, start + Duration::minutes(60))
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
    }
}
