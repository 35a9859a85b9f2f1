use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use coach_core::Clock;
use coach_core::model::{
    LearningAction, LearningLog, QuestionResult, QuizProgress, QuizQuestion, QuizSession,
    QuizSessionId, ResourceId, ResourceUpdate, RetentionScore,
};
use coach_core::retention::RetentionScorer;
use coach_core::scheduler::{ReviewScheduler, ScheduledReview};
use storage::repository::{LearningLogRepository, QuizSessionRepository, ResourceRepository};

use crate::error::QuizServiceError;

/// Outcome of answering one quiz question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizAnswerOutcome {
    pub progress: QuizProgress,
    pub quiz_complete: bool,
    /// Mean question score, set once the quiz is complete.
    pub final_score: Option<u8>,
    /// The resource's new retention score, set once the quiz is complete.
    pub retention_updated: Option<RetentionScore>,
    #[serde(skip)]
    pub scheduled: Option<ScheduledReview>,
}

/// Runs quiz sessions and feeds completed ones back into the resource's
/// review state.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    scorer: RetentionScorer,
    scheduler: ReviewScheduler,
    resources: Arc<dyn ResourceRepository>,
    sessions: Arc<dyn QuizSessionRepository>,
    logs: Arc<dyn LearningLogRepository>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        resources: Arc<dyn ResourceRepository>,
        sessions: Arc<dyn QuizSessionRepository>,
        logs: Arc<dyn LearningLogRepository>,
    ) -> Self {
        Self {
            clock,
            scorer: RetentionScorer::default(),
            scheduler: ReviewScheduler::new(),
            resources,
            sessions,
            logs,
        }
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: RetentionScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Open a quiz on `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` (`NotFound`) for an unknown resource and
    /// `QuizServiceError::Quiz` for an empty question list.
    pub async fn start_quiz(
        &self,
        resource_id: &ResourceId,
        questions: Vec<QuizQuestion>,
    ) -> Result<QuizSession, QuizServiceError> {
        self.resources.get_resource(resource_id).await?;
        let session = QuizSession::new(
            QuizSessionId::generate(),
            resource_id.clone(),
            questions,
            self.clock.now(),
        )?;
        self.sessions.save_session(&session).await?;
        Ok(session)
    }

    /// Record the answer to question `index` of a stored session.
    ///
    /// On the last answer the completed session is stored first, then the
    /// resource is rescored, rescheduled from today and a quiz learning log is
    /// appended. A completed session rejects further answers, so a quiz is
    /// scored at most once. A failed log write is logged and does not fail the
    /// answer.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` for answers to a completed session or out
    /// of order, and `QuizServiceError::Storage` when the session or resource
    /// cannot be loaded or written.
    pub async fn answer(
        &self,
        session_id: QuizSessionId,
        index: usize,
        result: QuestionResult,
    ) -> Result<QuizAnswerOutcome, QuizServiceError> {
        let mut session = self.sessions.get_session(session_id).await?;
        let now = self.clock.now();
        let progress = session.answer(index, result, now)?;

        if !progress.complete {
            self.sessions.save_session(&session).await?;
            return Ok(QuizAnswerOutcome {
                progress,
                quiz_complete: false,
                final_score: None,
                retention_updated: None,
                scheduled: None,
            });
        }

        self.sessions.save_session(&session).await?;

        let resource = self.resources.get_resource(session.resource_id()).await?;
        let new_score = self.scorer.score(resource.retention_score, session.answers());
        let scheduled = self.scheduler.schedule_review(new_score, self.clock.today());
        self.resources
            .update_resource(session.resource_id(), &ResourceUpdate::reviewed(&scheduled))
            .await?;

        let final_score = session.final_score();
        let elapsed = now.signed_duration_since(session.started_at());
        #[allow(clippy::cast_precision_loss)]
        let minutes = elapsed.num_seconds().max(0) as f64 / 60.0;
        let mut log = LearningLog::new(
            Some(session.resource_id().clone()),
            LearningAction::Quiz,
            minutes,
            now,
        );
        if let Some(score) = final_score {
            log = log.with_score(score);
        }
        if let Err(e) = self.logs.append_log(&log).await {
            warn!(session = %session_id, error = %e, "quiz: failed to append learning log");
        }

        info!(
            session = %session_id,
            resource = %session.resource_id(),
            score = new_score.value(),
            next_review = %scheduled.next_review(),
            "quiz completed"
        );

        Ok(QuizAnswerOutcome {
            progress,
            quiz_complete: true,
            final_score,
            retention_updated: Some(new_score),
            scheduled: Some(scheduled),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use coach_core::model::{QuizError, ResourceRecord};
    use coach_core::time::{fixed_now, fixed_today};
    use storage::repository::{Storage, StorageError};

    async fn service_with(clock: Clock) -> (QuizService, Storage, ResourceId) {
        let storage = Storage::in_memory();
        let id = ResourceId::new("04_resources/rust.md");
        let record = ResourceRecord::new(id.clone(), "Rust Book")
            .with_last_reviewed(Some(fixed_today() - Duration::days(4)));
        storage.resources.upsert_resource(&record).await.unwrap();
        let service = QuizService::new(
            clock,
            Arc::clone(&storage.resources),
            Arc::clone(&storage.quiz_sessions),
            Arc::clone(&storage.learning_logs),
        );
        (service, storage, id)
    }

    fn questions(n: usize) -> Vec<QuizQuestion> {
        (0..n).map(|i| QuizQuestion::recall(format!("Q{i}"))).collect()
    }

    #[tokio::test]
    async fn start_rejects_unknown_resource_and_empty_quiz() {
        let (service, _, id) = service_with(Clock::fixed(fixed_now())).await;

        let unknown = service
            .start_quiz(&ResourceId::new("nope.md"), questions(1))
            .await
            .unwrap_err();
        assert!(matches!(unknown, QuizServiceError::Storage(StorageError::NotFound)));

        let empty = service.start_quiz(&id, Vec::new()).await.unwrap_err();
        assert!(matches!(empty, QuizServiceError::Quiz(QuizError::NoQuestions)));
    }

    #[tokio::test]
    async fn partial_answers_do_not_touch_the_resource() {
        let (service, storage, id) = service_with(Clock::fixed(fixed_now())).await;
        let session = service.start_quiz(&id, questions(2)).await.unwrap();

        let outcome = service
            .answer(session.id(), 0, QuestionResult::correct())
            .await
            .unwrap();
        assert!(!outcome.quiz_complete);
        assert_eq!(outcome.progress.remaining, 1);
        assert!(outcome.retention_updated.is_none());

        let record = storage.resources.get_resource(&id).await.unwrap();
        assert_eq!(record.review_count, 0);
    }

    #[tokio::test]
    async fn completing_a_quiz_rescores_and_logs() {
        let (service, storage, id) = service_with(Clock::fixed(fixed_now())).await;
        let session = service.start_quiz(&id, questions(2)).await.unwrap();

        service.answer(session.id(), 0, QuestionResult::correct()).await.unwrap();
        let outcome = service
            .answer(session.id(), 1, QuestionResult::incorrect())
            .await
            .unwrap();

        assert!(outcome.quiz_complete);
        assert_eq!(outcome.final_score, Some(50));
        // 0.4 * 50 + 0.6 * 50
        let score = outcome.retention_updated.unwrap();
        assert_eq!(score.value(), 50);

        let record = storage.resources.get_resource(&id).await.unwrap();
        assert_eq!(record.retention_score, score);
        assert_eq!(record.review_count, 1);
        assert_eq!(record.last_reviewed, Some(fixed_today()));
        assert_eq!(record.next_review, Some(fixed_today() + Duration::days(3)));

        let logs = storage
            .learning_logs
            .logs_between(fixed_now() - Duration::hours(1), fixed_now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, LearningAction::Quiz);
        assert_eq!(logs[0].score, Some(50));

        let stored = storage.quiz_sessions.get_session(session.id()).await.unwrap();
        assert!(stored.is_complete());
    }

    #[tokio::test]
    async fn answering_a_finished_quiz_fails() {
        let (service, _, id) = service_with(Clock::fixed(fixed_now())).await;
        let session = service.start_quiz(&id, questions(1)).await.unwrap();
        service.answer(session.id(), 0, QuestionResult::correct()).await.unwrap();

        let err = service
            .answer(session.id(), 1, QuestionResult::correct())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizServiceError::Quiz(QuizError::Completed)));
    }

    /// Session store whose first save of a completed session fails.
    struct FailFirstCompletedSave {
        inner: Arc<dyn QuizSessionRepository>,
        failed: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl QuizSessionRepository for FailFirstCompletedSave {
        async fn save_session(&self, session: &QuizSession) -> Result<(), StorageError> {
            use std::sync::atomic::Ordering;
            if session.is_complete() && !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StorageError::Connection("disk full".into()));
            }
            self.inner.save_session(session).await
        }

        async fn get_session(&self, id: QuizSessionId) -> Result<QuizSession, StorageError> {
            self.inner.get_session(id).await
        }
    }

    #[tokio::test]
    async fn failed_session_save_does_not_score_the_quiz_twice() {
        let (_, storage, id) = service_with(Clock::fixed(fixed_now())).await;
        let sessions: Arc<dyn QuizSessionRepository> = Arc::new(FailFirstCompletedSave {
            inner: Arc::clone(&storage.quiz_sessions),
            failed: std::sync::atomic::AtomicBool::new(false),
        });
        let service = QuizService::new(
            Clock::fixed(fixed_now()),
            Arc::clone(&storage.resources),
            sessions,
            Arc::clone(&storage.learning_logs),
        );
        let session = service.start_quiz(&id, questions(1)).await.unwrap();

        let err = service
            .answer(session.id(), 0, QuestionResult::correct())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizServiceError::Storage(StorageError::Connection(_))));
        let record = storage.resources.get_resource(&id).await.unwrap();
        assert_eq!(record.review_count, 0);
        assert_eq!(record.retention_score.value(), 50);

        let outcome = service
            .answer(session.id(), 0, QuestionResult::correct())
            .await
            .unwrap();
        assert!(outcome.quiz_complete);
        let record = storage.resources.get_resource(&id).await.unwrap();
        assert_eq!(record.review_count, 1);
        // 0.4 * 50 + 0.6 * 100
        assert_eq!(record.retention_score.value(), 80);

        let again = service
            .answer(session.id(), 0, QuestionResult::correct())
            .await
            .unwrap_err();
        assert!(matches!(again, QuizServiceError::Quiz(QuizError::Completed)));
        let record = storage.resources.get_resource(&id).await.unwrap();
        assert_eq!(record.review_count, 1);
    }

    #[tokio::test]
    async fn out_of_order_answer_is_rejected() {
        let (service, _, id) = service_with(Clock::fixed(fixed_now())).await;
        let session = service.start_quiz(&id, questions(3)).await.unwrap();
        let err = service
            .answer(session.id(), 2, QuestionResult::correct())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuizServiceError::Quiz(QuizError::OutOfOrder { expected: 0, provided: 2 })
        ));
    }
}
