use serde::{Deserialize, Serialize};

/// Weekly hour target used when a learning path does not set one.
pub const DEFAULT_WEEKLY_TARGET_HOURS: f64 = 5.0;

/// The learner's current course of study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub name: String,
    pub weekly_target_hours: f64,
    pub current_milestone: Option<String>,
    /// Overall completion, 0–100.
    pub overall_progress: u8,
}

impl LearningPath {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weekly_target_hours: DEFAULT_WEEKLY_TARGET_HOURS,
            current_milestone: None,
            overall_progress: 0,
        }
    }

    #[must_use]
    pub fn with_weekly_target(mut self, hours: f64) -> Self {
        self.weekly_target_hours = hours.max(0.0);
        self
    }

    #[must_use]
    pub fn with_milestone(mut self, milestone: impl Into<String>) -> Self {
        self.current_milestone = Some(milestone.into());
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.overall_progress = progress.min(100);
        self
    }
}
