use thiserror::Error;

use crate::model::{QuizError, RetentionScoreError, StatusTransitionError};
use crate::retention::ScoringError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    RetentionScore(#[from] RetentionScoreError),
    #[error(transparent)]
    StatusTransition(#[from] StatusTransitionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}
