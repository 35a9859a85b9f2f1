use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuizSessionId, ResourceId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuizError {
    #[error("a quiz needs at least one question")]
    NoQuestions,
    #[error("quiz session already completed")]
    Completed,
    #[error("expected an answer for question {expected}, got {provided}")]
    OutOfOrder { expected: usize, provided: usize },
    #[error("partial credit must be within 0..=100, got {0}")]
    InvalidPartialCredit(u8),
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[default]
    Recall,
    Application,
    Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,
    #[serde(default)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub difficulty: QuestionDifficulty,
}

impl QuizQuestion {
    #[must_use]
    pub fn recall(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: QuestionKind::Recall,
            difficulty: QuestionDifficulty::Medium,
        }
    }
}

/// Outcome of one answered question.
///
/// `partial_credit` (0–100) overrides the binary score when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub correct: bool,
    pub partial_credit: Option<u8>,
}

impl QuestionResult {
    #[must_use]
    pub fn correct() -> Self {
        Self {
            correct: true,
            partial_credit: None,
        }
    }

    #[must_use]
    pub fn incorrect() -> Self {
        Self {
            correct: false,
            partial_credit: None,
        }
    }

    /// # Errors
    ///
    /// Returns `QuizError::InvalidPartialCredit` for credit above 100.
    pub fn partial(correct: bool, credit: u8) -> Result<Self, QuizError> {
        if credit > 100 {
            return Err(QuizError::InvalidPartialCredit(credit));
        }
        Ok(Self {
            correct,
            partial_credit: Some(credit),
        })
    }

    /// Score of this question on the 0–100 scale.
    #[must_use]
    pub fn score(&self) -> u8 {
        match self.partial_credit {
            Some(credit) => credit.min(100),
            None if self.correct => 100,
            None => 0,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Progress through a quiz after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizProgress {
    pub answered: usize,
    pub remaining: usize,
    pub correct_so_far: usize,
    pub complete: bool,
}

/// One quiz attempt on a resource. Answers are taken strictly in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSession {
    id: QuizSessionId,
    resource_id: ResourceId,
    questions: Vec<QuizQuestion>,
    answers: Vec<QuestionResult>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` when `questions` is empty.
    pub fn new(
        id: QuizSessionId,
        resource_id: ResourceId,
        questions: Vec<QuizQuestion>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        Ok(Self {
            id,
            resource_id,
            questions,
            answers: Vec::new(),
            started_at,
            completed_at: None,
        })
    }

    /// Rehydrate a stored session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` for an empty question list.
    pub fn from_persisted(
        id: QuizSessionId,
        resource_id: ResourceId,
        questions: Vec<QuizQuestion>,
        answers: Vec<QuestionResult>,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, QuizError> {
        let mut session = Self::new(id, resource_id, questions, started_at)?;
        session.answers = answers;
        session.completed_at = completed_at;
        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> QuizSessionId {
        self.id
    }

    #[must_use]
    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &[QuestionResult] {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.correct).count()
    }

    /// The next unanswered question, if any.
    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        if self.is_complete() {
            return None;
        }
        self.questions.get(self.answers.len())
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        QuizProgress {
            answered: self.answers.len(),
            remaining: self.questions.len().saturating_sub(self.answers.len()),
            correct_so_far: self.correct_count(),
            complete: self.is_complete(),
        }
    }

    /// Record the answer to question `index` (zero-based).
    ///
    /// The session completes at `answered_at` once every question has an answer.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` for a finished session and
    /// `QuizError::OutOfOrder` when `index` is not the next question.
    pub fn answer(
        &mut self,
        index: usize,
        result: QuestionResult,
        answered_at: DateTime<Utc>,
    ) -> Result<QuizProgress, QuizError> {
        if self.is_complete() {
            return Err(QuizError::Completed);
        }
        let expected = self.answers.len();
        if index != expected {
            return Err(QuizError::OutOfOrder {
                expected,
                provided: index,
            });
        }

        self.answers.push(result);
        if self.answers.len() == self.questions.len() {
            self.completed_at = Some(answered_at);
        }
        Ok(self.progress())
    }

    /// Mean question score, truncated, once the session is complete.
    #[must_use]
    pub fn final_score(&self) -> Option<u8> {
        if !self.is_complete() || self.answers.is_empty() {
            return None;
        }
        let total: u32 = self.answers.iter().map(|a| u32::from(a.score())).sum();
        let count = u32::try_from(self.answers.len()).ok()?;
        u8::try_from(total / count).ok()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
