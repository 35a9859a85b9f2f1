use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::ResourceId;
use crate::model::resource::ParseEnumError;

/// What kind of study activity a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningAction {
    Quiz,
    Review,
    VoiceCapture,
    Chat,
}

impl LearningAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LearningAction::Quiz => "quiz",
            LearningAction::Review => "review",
            LearningAction::VoiceCapture => "voice_capture",
            LearningAction::Chat => "chat",
        }
    }
}

impl fmt::Display for LearningAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "quiz" => Ok(Self::Quiz),
            "review" => Ok(Self::Review),
            "voice_capture" => Ok(Self::VoiceCapture),
            "chat" => Ok(Self::Chat),
            other => Err(ParseEnumError::new("learning action", other)),
        }
    }
}

/// A single study activity, used for weekly hours and streaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningLog {
    pub resource_id: Option<ResourceId>,
    pub action: LearningAction,
    pub duration_minutes: f64,
    pub logged_at: DateTime<Utc>,
    pub score: Option<u8>,
}

impl LearningLog {
    #[must_use]
    pub fn new(
        resource_id: Option<ResourceId>,
        action: LearningAction,
        duration_minutes: f64,
        logged_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_id,
            action,
            duration_minutes: if duration_minutes.is_finite() {
                duration_minutes.max(0.0)
            } else {
                0.0
            },
            logged_at,
            score: None,
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: u8) -> Self {
        self.score = Some(score.min(100));
        self
    }
}
