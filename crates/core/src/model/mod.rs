mod ids;
mod learning_path;
mod log;
mod nudge;
mod quiz;
mod resource;

pub use ids::{NudgeId, ParseIdError, QuizSessionId, ResourceId};
pub use learning_path::{DEFAULT_WEEKLY_TARGET_HOURS, LearningPath};
pub use log::{LearningAction, LearningLog};
pub use nudge::{NewNudge, Nudge, NudgeKind};
pub use quiz::{
    QuestionDifficulty, QuestionKind, QuestionResult, QuizError, QuizProgress, QuizQuestion,
    QuizSession,
};
pub use resource::{
    CompletionStatus, LearningStatus, MASTERY_THRESHOLD, ParseEnumError, ResourceRecord,
    ResourceUpdate, RetentionScore, RetentionScoreError, ReviewUpdate, RiskLevel,
    StatusTransitionError,
};
