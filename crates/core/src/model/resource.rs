use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::ResourceId;
use crate::scheduler::ScheduledReview;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetentionScoreError {
    #[error("retention score must be within 0..=100, got {0}")]
    OutOfRange(i64),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatusTransitionError {
    #[error("cannot move resource from {from} to {to}")]
    NotAllowed {
        from: LearningStatus,
        to: LearningStatus,
    },
    #[error("mastery requires retention >= {required} after at least one review (score {score}, reviews {reviews})")]
    MasteryNotReached {
        required: u8,
        score: u8,
        reviews: u32,
    },
}

/// Error returned when an enum value cannot be parsed from its storage string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {raw}")]
pub struct ParseEnumError {
    kind: &'static str,
    raw: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_owned(),
        }
    }
}

//
// ─── RETENTION SCORE ───────────────────────────────────────────────────────────
//

/// Estimate (0–100) of how well a resource is currently remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct RetentionScore(u8);

impl RetentionScore {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(100);
    /// Score assigned to a freshly created resource.
    pub const INITIAL: Self = Self(50);

    /// # Errors
    ///
    /// Returns `RetentionScoreError::OutOfRange` for values above 100.
    pub fn new(value: u8) -> Result<Self, RetentionScoreError> {
        Self::try_from(i64::from(value))
    }

    /// Clamp an arbitrary integer into the valid range.
    #[must_use]
    pub fn saturating(value: i64) -> Self {
        // clamp keeps the value inside 0..=100, so the cast is lossless
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let clamped = value.clamp(0, 100) as u8;
        Self(clamped)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for RetentionScore {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl TryFrom<i64> for RetentionScore {
    type Error = RetentionScoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(RetentionScoreError::OutOfRange(value))
    }
}

impl From<RetentionScore> for u8 {
    fn from(score: RetentionScore) -> Self {
        score.0
    }
}

impl fmt::Display for RetentionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── STATUS ENUMS ──────────────────────────────────────────────────────────────
//

/// Lifecycle of a resource from the learner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStatus {
    NotStarted,
    #[default]
    Active,
    Paused,
    Completed,
    Abandoned,
    Mastered,
}

impl LearningStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LearningStatus::NotStarted => "not_started",
            LearningStatus::Active => "active",
            LearningStatus::Paused => "paused",
            LearningStatus::Completed => "completed",
            LearningStatus::Abandoned => "abandoned",
            LearningStatus::Mastered => "mastered",
        }
    }

    /// Whether abandonment detection looks at resources in this status.
    #[must_use]
    pub fn is_tracked(self) -> bool {
        matches!(self, LearningStatus::Active | LearningStatus::Paused)
    }

    /// Edges of the status graph, ignoring the mastery score condition.
    #[must_use]
    pub fn can_transition_to(self, next: LearningStatus) -> bool {
        use LearningStatus::{Abandoned, Active, Completed, Mastered, NotStarted, Paused};
        matches!(
            (self, next),
            (NotStarted, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active | Paused, Completed | Abandoned)
                | (Active | Completed, Mastered)
        )
    }
}

impl fmt::Display for LearningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearningStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not_started" => Ok(Self::NotStarted),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            "mastered" => Ok(Self::Mastered),
            other => Err(ParseEnumError::new("learning status", other)),
        }
    }
}

/// How far through the material the learner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotStarted,
    #[default]
    InProgress,
    Completed,
}

impl CompletionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionStatus::NotStarted => "not_started",
            CompletionStatus::InProgress => "in_progress",
            CompletionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ParseEnumError::new("completion status", other)),
        }
    }
}

/// Derived likelihood that a resource is dropped without completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ParseEnumError::new("risk level", other)),
        }
    }
}

//
// ─── RESOURCE RECORD ───────────────────────────────────────────────────────────
//

/// Score a resource must hold after a review before it can be marked mastered.
pub const MASTERY_THRESHOLD: u8 = 86;

/// Persisted shape of a learning resource.
///
/// Stores own these records; the engine changes them only through
/// `ResourceUpdate`, which is the sole path that writes `next_review` and
/// `abandonment_risk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub title: String,
    pub learning_status: LearningStatus,
    pub last_reviewed: Option<NaiveDate>,
    pub next_review: Option<NaiveDate>,
    pub review_count: u32,
    pub retention_score: RetentionScore,
    pub abandonment_risk: RiskLevel,
    pub hours_invested: f64,
    pub estimated_hours: f64,
    pub completion_status: CompletionStatus,
    pub key_insights: Vec<String>,
    pub learning_path: Option<String>,
}

impl ResourceRecord {
    /// A freshly tracked resource: active, in progress, retention 50, never reviewed.
    #[must_use]
    pub fn new(id: ResourceId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            learning_status: LearningStatus::Active,
            last_reviewed: None,
            next_review: None,
            review_count: 0,
            retention_score: RetentionScore::INITIAL,
            abandonment_risk: RiskLevel::Low,
            hours_invested: 0.0,
            estimated_hours: 0.0,
            completion_status: CompletionStatus::InProgress,
            key_insights: Vec::new(),
            learning_path: None,
        }
    }

    #[must_use]
    pub fn with_last_reviewed(mut self, day: Option<NaiveDate>) -> Self {
        self.last_reviewed = day;
        self
    }

    #[must_use]
    pub fn with_hours(mut self, invested: f64, estimated: f64) -> Self {
        self.hours_invested = invested.max(0.0);
        self.estimated_hours = estimated.max(0.0);
        self
    }

    #[must_use]
    pub fn with_completion(mut self, status: CompletionStatus) -> Self {
        self.completion_status = status;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: LearningStatus) -> Self {
        self.learning_status = status;
        self
    }

    #[must_use]
    pub fn with_key_insights(mut self, insights: Vec<String>) -> Self {
        self.key_insights = insights;
        self
    }

    #[must_use]
    pub fn with_learning_path(mut self, path: impl Into<String>) -> Self {
        self.learning_path = Some(path.into());
        self
    }

    /// Replace review state with a scheduler-produced review.
    #[must_use]
    pub fn with_review(mut self, scheduled: &ScheduledReview, review_count: u32) -> Self {
        self.retention_score = scheduled.score();
        self.last_reviewed = Some(scheduled.reviewed_on());
        self.next_review = Some(scheduled.next_review());
        self.review_count = review_count;
        self
    }

    /// Validate a status change against the lifecycle graph.
    ///
    /// # Errors
    ///
    /// Returns `StatusTransitionError::NotAllowed` for edges outside the graph and
    /// `MasteryNotReached` when moving to `Mastered` without a qualifying review.
    pub fn check_status_transition(&self, next: LearningStatus) -> Result<(), StatusTransitionError> {
        if !self.learning_status.can_transition_to(next) {
            return Err(StatusTransitionError::NotAllowed {
                from: self.learning_status,
                to: next,
            });
        }

        if next == LearningStatus::Mastered
            && (self.review_count == 0 || self.retention_score.value() < MASTERY_THRESHOLD)
        {
            return Err(StatusTransitionError::MasteryNotReached {
                required: MASTERY_THRESHOLD,
                score: self.retention_score.value(),
                reviews: self.review_count,
            });
        }

        Ok(())
    }

    /// Apply an engine update in place.
    pub fn apply(&mut self, update: &ResourceUpdate) {
        if let Some(risk) = update.abandonment_risk {
            self.abandonment_risk = risk;
        }
        if let Some(review) = &update.review {
            self.retention_score = review.retention_score;
            self.last_reviewed = Some(review.reviewed_on);
            self.next_review = Some(review.next_review);
            self.review_count = self.review_count.saturating_add(1);
        }
        if let Some(status) = update.learning_status {
            self.learning_status = status;
        }
        if let Some(hours) = update.added_hours {
            self.hours_invested += hours;
        }
    }
}

//
// ─── RESOURCE UPDATE ───────────────────────────────────────────────────────────
//

/// Review fields written together after a completed quiz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewUpdate {
    retention_score: RetentionScore,
    reviewed_on: NaiveDate,
    next_review: NaiveDate,
}

impl ReviewUpdate {
    #[must_use]
    pub fn retention_score(&self) -> RetentionScore {
        self.retention_score
    }

    #[must_use]
    pub fn reviewed_on(&self) -> NaiveDate {
        self.reviewed_on
    }

    #[must_use]
    pub fn next_review(&self) -> NaiveDate {
        self.next_review
    }
}

/// Field-level change to a `ResourceRecord`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceUpdate {
    abandonment_risk: Option<RiskLevel>,
    review: Option<ReviewUpdate>,
    learning_status: Option<LearningStatus>,
    added_hours: Option<f64>,
}

impl ResourceUpdate {
    /// Record a freshly classified risk level.
    #[must_use]
    pub fn risk(level: RiskLevel) -> Self {
        Self {
            abandonment_risk: Some(level),
            ..Self::default()
        }
    }

    /// Record a completed review; increments the review count when applied.
    #[must_use]
    pub fn reviewed(scheduled: &ScheduledReview) -> Self {
        Self {
            review: Some(ReviewUpdate {
                retention_score: scheduled.score(),
                reviewed_on: scheduled.reviewed_on(),
                next_review: scheduled.next_review(),
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn status(status: LearningStatus) -> Self {
        Self {
            learning_status: Some(status),
            ..Self::default()
        }
    }

    /// Add study time to `hours_invested`. Negative values are ignored.
    #[must_use]
    pub fn hours(added: f64) -> Self {
        Self {
            added_hours: (added.is_finite() && added > 0.0).then_some(added),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn abandonment_risk(&self) -> Option<RiskLevel> {
        self.abandonment_risk
    }

    #[must_use]
    pub fn review(&self) -> Option<&ReviewUpdate> {
        self.review.as_ref()
    }

    #[must_use]
    pub fn learning_status(&self) -> Option<LearningStatus> {
        self.learning_status
    }

    #[must_use]
    pub fn added_hours(&self) -> Option<f64> {
        self.added_hours
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ReviewScheduler;
    use crate::time::fixed_today;

    fn record() -> ResourceRecord {
        ResourceRecord::new(ResourceId::new("04_resources/rust-book.md"), "Rust Book")
    }

    #[test]
    fn retention_score_rejects_out_of_range() {
        assert!(RetentionScore::new(100).is_ok());
        assert_eq!(
            RetentionScore::new(101).unwrap_err(),
            RetentionScoreError::OutOfRange(101)
        );
        assert!(RetentionScore::try_from(-1).is_err());
        assert_eq!(RetentionScore::saturating(250), RetentionScore::MAX);
        assert_eq!(RetentionScore::saturating(-5), RetentionScore::MIN);
    }

    #[test]
    fn new_record_starts_at_initial_score() {
        let r = record();
        assert_eq!(r.retention_score.value(), 50);
        assert_eq!(r.abandonment_risk, RiskLevel::Low);
        assert_eq!(r.review_count, 0);
        assert!(r.next_review.is_none());
    }

    #[test]
    fn enum_strings_round_trip() {
        for status in [
            LearningStatus::NotStarted,
            LearningStatus::Active,
            LearningStatus::Paused,
            LearningStatus::Completed,
            LearningStatus::Abandoned,
            LearningStatus::Mastered,
        ] {
            assert_eq!(status.as_str().parse::<LearningStatus>().unwrap(), status);
        }
        assert_eq!("in_progress".parse::<CompletionStatus>().unwrap(), CompletionStatus::InProgress);
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("extreme".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn status_graph_matches_lifecycle() {
        use LearningStatus::*;
        assert!(NotStarted.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Paused.can_transition_to(Abandoned));
        assert!(Active.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Mastered));
        assert!(!Paused.can_transition_to(Mastered));
        assert!(!Abandoned.can_transition_to(Active));
        assert!(!NotStarted.can_transition_to(Completed));
    }

    #[test]
    fn mastery_requires_reviewed_high_score() {
        let r = record();
        let err = r.check_status_transition(LearningStatus::Mastered).unwrap_err();
        assert!(matches!(err, StatusTransitionError::MasteryNotReached { .. }));

        let scheduled = ReviewScheduler::new().schedule_review(
            RetentionScore::new(90).unwrap(),
            fixed_today(),
        );
        let mastered = record().with_review(&scheduled, 1);
        assert!(mastered.check_status_transition(LearningStatus::Mastered).is_ok());
    }

    #[test]
    fn apply_review_update_increments_count_and_sets_schedule() {
        let mut r = record();
        let scheduled = ReviewScheduler::new().schedule_review(
            RetentionScore::new(40).unwrap(),
            fixed_today(),
        );
        r.apply(&ResourceUpdate::reviewed(&scheduled));

        assert_eq!(r.review_count, 1);
        assert_eq!(r.retention_score.value(), 40);
        assert_eq!(r.last_reviewed, Some(fixed_today()));
        assert_eq!(r.next_review, Some(fixed_today() + chrono::Duration::days(3)));
    }

    #[test]
    fn risk_update_is_idempotent() {
        let mut r = record();
        let update = ResourceUpdate::risk(RiskLevel::Medium);
        r.apply(&update);
        let once = r.clone();
        r.apply(&update);
        assert_eq!(r, once);
    }

    #[test]
    fn hours_update_ignores_non_positive() {
        assert!(ResourceUpdate::hours(-2.0).is_empty());
        assert!(ResourceUpdate::hours(f64::NAN).is_empty());

        let mut r = record();
        r.apply(&ResourceUpdate::hours(1.5));
        assert!((r.hours_invested - 1.5).abs() < f64::EPSILON);
    }
}
