use std::sync::Arc;

use tracing::info;

use coach_core::model::{LearningStatus, ResourceId, ResourceRecord, ResourceUpdate};
use storage::repository::ResourceRepository;

use crate::error::ResourceServiceError;

/// User-driven changes to a resource's lifecycle.
#[derive(Clone)]
pub struct ResourceService {
    resources: Arc<dyn ResourceRepository>,
}

impl ResourceService {
    #[must_use]
    pub fn new(resources: Arc<dyn ResourceRepository>) -> Self {
        Self { resources }
    }

    /// Move a resource to `next` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns `ResourceServiceError::Transition` for a disallowed edge or an
    /// unqualified mastery claim, and `ResourceServiceError::Storage` on
    /// repository failures.
    pub async fn change_status(
        &self,
        id: &ResourceId,
        next: LearningStatus,
    ) -> Result<ResourceRecord, ResourceServiceError> {
        let current = self.resources.get_resource(id).await?;
        current.check_status_transition(next)?;

        let updated = self
            .resources
            .update_resource(id, &ResourceUpdate::status(next))
            .await?;
        info!(
            resource = %id,
            from = %current.learning_status,
            to = %next,
            "status changed"
        );
        Ok(updated)
    }

    /// Record study time against a resource.
    ///
    /// # Errors
    ///
    /// Returns `ResourceServiceError::Storage` on repository failures.
    pub async fn add_hours(
        &self,
        id: &ResourceId,
        hours: f64,
    ) -> Result<ResourceRecord, ResourceServiceError> {
        let hours = if hours.is_finite() { hours.max(0.0) } else { 0.0 };
        let updated = self
            .resources
            .update_resource(id, &ResourceUpdate::hours(hours))
            .await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::model::{RetentionScore, StatusTransitionError};
    use coach_core::scheduler::ReviewScheduler;
    use coach_core::time::fixed_today;
    use storage::repository::{Storage, StorageError};

    async fn setup(record: ResourceRecord) -> (ResourceService, ResourceId) {
        let storage = Storage::in_memory();
        let id = record.id.clone();
        storage.resources.upsert_resource(&record).await.unwrap();
        (ResourceService::new(Arc::clone(&storage.resources)), id)
    }

    #[tokio::test]
    async fn pause_and_resume() {
        let (service, id) = setup(ResourceRecord::new(ResourceId::new("a.md"), "A")).await;
        let paused = service.change_status(&id, LearningStatus::Paused).await.unwrap();
        assert_eq!(paused.learning_status, LearningStatus::Paused);
        let active = service.change_status(&id, LearningStatus::Active).await.unwrap();
        assert_eq!(active.learning_status, LearningStatus::Active);
    }

    #[tokio::test]
    async fn mastery_requires_a_strong_review() {
        let (service, id) = setup(ResourceRecord::new(ResourceId::new("a.md"), "A")).await;
        let err = service
            .change_status(&id, LearningStatus::Mastered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceServiceError::Transition(StatusTransitionError::MasteryNotReached { .. })
        ));

        let scheduled =
            ReviewScheduler::new().schedule_review(RetentionScore::new(90).unwrap(), fixed_today());
        let strong = ResourceRecord::new(ResourceId::new("b.md"), "B").with_review(&scheduled, 1);
        let (service, id) = setup(strong).await;
        let mastered = service.change_status(&id, LearningStatus::Mastered).await.unwrap();
        assert_eq!(mastered.learning_status, LearningStatus::Mastered);
    }

    #[tokio::test]
    async fn abandoned_is_terminal() {
        let record =
            ResourceRecord::new(ResourceId::new("a.md"), "A").with_status(LearningStatus::Abandoned);
        let (service, id) = setup(record).await;
        let err = service
            .change_status(&id, LearningStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceServiceError::Transition(StatusTransitionError::NotAllowed { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found() {
        let (service, _) = setup(ResourceRecord::new(ResourceId::new("a.md"), "A")).await;
        let err = service
            .change_status(&ResourceId::new("zzz.md"), LearningStatus::Paused)
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceServiceError::Storage(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn add_hours_accumulates() {
        let (service, id) = setup(ResourceRecord::new(ResourceId::new("a.md"), "A")).await;
        service.add_hours(&id, 1.5).await.unwrap();
        let updated = service.add_hours(&id, 0.5).await.unwrap();
        assert!((updated.hours_invested - 2.0).abs() < f64::EPSILON);
    }
}
