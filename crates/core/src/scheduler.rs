use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::RetentionScore;

//
// ─── REVIEW TIERS ──────────────────────────────────────────────────────────────
//

/// Kind of review the learner is asked to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    FullQuiz,
    QuickQuiz,
    ConnectionPrompt,
    ApplicationChallenge,
}

impl ReviewType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewType::FullQuiz => "full_quiz",
            ReviewType::QuickQuiz => "quick_quiz",
            ReviewType::ConnectionPrompt => "connection_prompt",
            ReviewType::ApplicationChallenge => "application_challenge",
        }
    }

    /// Rough time budget shown in the daily briefing.
    #[must_use]
    pub fn estimated_minutes(self) -> u32 {
        match self {
            ReviewType::FullQuiz => 10,
            ReviewType::QuickQuiz | ReviewType::ApplicationChallenge => 5,
            ReviewType::ConnectionPrompt => 3,
        }
    }
}

/// Intensity of the next review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDifficulty {
    Hard,
    Medium,
    Easy,
    Maintenance,
}

impl ReviewDifficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewDifficulty::Hard => "hard",
            ReviewDifficulty::Medium => "medium",
            ReviewDifficulty::Easy => "easy",
            ReviewDifficulty::Maintenance => "maintenance",
        }
    }
}

/// One row of the spaced-repetition table.
///
/// # Examples
///
/// ```
/// # use coach_core::model::RetentionScore;
/// # use coach_core::scheduler::{ReviewScheduler, ReviewType};
/// let plan = ReviewScheduler::new().schedule(RetentionScore::new(45).unwrap());
/// assert_eq!(plan.interval_days, 3);
/// assert_eq!(plan.review_type, ReviewType::QuickQuiz);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPlan {
    pub interval_days: u32,
    pub review_type: ReviewType,
    pub difficulty: ReviewDifficulty,
}

const FULL_QUIZ: ReviewPlan = ReviewPlan {
    interval_days: 1,
    review_type: ReviewType::FullQuiz,
    difficulty: ReviewDifficulty::Hard,
};

const QUICK_QUIZ: ReviewPlan = ReviewPlan {
    interval_days: 3,
    review_type: ReviewType::QuickQuiz,
    difficulty: ReviewDifficulty::Medium,
};

const CONNECTION_PROMPT: ReviewPlan = ReviewPlan {
    interval_days: 7,
    review_type: ReviewType::ConnectionPrompt,
    difficulty: ReviewDifficulty::Easy,
};

const APPLICATION_CHALLENGE: ReviewPlan = ReviewPlan {
    interval_days: 30,
    review_type: ReviewType::ApplicationChallenge,
    difficulty: ReviewDifficulty::Maintenance,
};

//
// ─── SCHEDULED REVIEW ──────────────────────────────────────────────────────────
//

/// A plan bound to the score it was derived from and the day it applies to.
///
/// This is the only source of a resource's `next_review`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledReview {
    score: RetentionScore,
    plan: ReviewPlan,
    reviewed_on: NaiveDate,
    next_review: NaiveDate,
}

impl ScheduledReview {
    #[must_use]
    pub fn score(&self) -> RetentionScore {
        self.score
    }

    #[must_use]
    pub fn plan(&self) -> ReviewPlan {
        self.plan
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

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Maps retention scores to review intervals.
///
/// Lower scores get shorter intervals so weak material comes back sooner:
///
/// | score  | interval | review type           | difficulty  |
/// |--------|----------|-----------------------|-------------|
/// | 0–30   | 1 day    | full quiz             | hard        |
/// | 31–60  | 3 days   | quick quiz            | medium      |
/// | 61–85  | 7 days   | connection prompt     | easy        |
/// | 86–100 | 30 days  | application challenge | maintenance |
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewScheduler;

impl ReviewScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Select the tier for a score. Total over 0..=100.
    #[must_use]
    pub fn schedule(&self, score: RetentionScore) -> ReviewPlan {
        match score.value() {
            0..=30 => FULL_QUIZ,
            31..=60 => QUICK_QUIZ,
            61..=85 => CONNECTION_PROMPT,
            _ => APPLICATION_CHALLENGE,
        }
    }

    /// Next review date counted from the last review, or from `today` when there is none.
    #[must_use]
    pub fn next_review_date(
        &self,
        score: RetentionScore,
        last_reviewed: Option<NaiveDate>,
        today: NaiveDate,
    ) -> NaiveDate {
        let base = last_reviewed.unwrap_or(today);
        base + Duration::days(i64::from(self.schedule(score).interval_days))
    }

    /// Schedule the review that follows one completed on `reviewed_on`.
    #[must_use]
    pub fn schedule_review(&self, score: RetentionScore, reviewed_on: NaiveDate) -> ScheduledReview {
        let plan = self.schedule(score);
        ScheduledReview {
            score,
            plan,
            reviewed_on,
            next_review: self.next_review_date(score, Some(reviewed_on), reviewed_on),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_today;
    use proptest::prelude::*;

    fn score(v: u8) -> RetentionScore {
        RetentionScore::new(v).unwrap()
    }

    #[test]
    fn tier_boundaries() {
        let s = ReviewScheduler::new();
        assert_eq!(s.schedule(score(0)), FULL_QUIZ);
        assert_eq!(s.schedule(score(30)), FULL_QUIZ);
        assert_eq!(s.schedule(score(31)), QUICK_QUIZ);
        assert_eq!(s.schedule(score(60)), QUICK_QUIZ);
        assert_eq!(s.schedule(score(61)), CONNECTION_PROMPT);
        assert_eq!(s.schedule(score(85)), CONNECTION_PROMPT);
        assert_eq!(s.schedule(score(86)), APPLICATION_CHALLENGE);
        assert_eq!(s.schedule(score(100)), APPLICATION_CHALLENGE);
    }

    #[test]
    fn next_review_counts_from_last_review() {
        let s = ReviewScheduler::new();
        let last = fixed_today() - Duration::days(2);
        assert_eq!(
            s.next_review_date(score(70), Some(last), fixed_today()),
            last + Duration::days(7)
        );
    }

    #[test]
    fn next_review_without_history_counts_from_today() {
        let s = ReviewScheduler::new();
        assert_eq!(
            s.next_review_date(score(10), None, fixed_today()),
            fixed_today() + Duration::days(1)
        );
    }

    #[test]
    fn scheduled_review_carries_its_score() {
        let scheduled = ReviewScheduler::new().schedule_review(score(95), fixed_today());
        assert_eq!(scheduled.score(), score(95));
        assert_eq!(scheduled.plan().review_type, ReviewType::ApplicationChallenge);
        assert_eq!(scheduled.next_review(), fixed_today() + Duration::days(30));
    }

    #[test]
    fn estimated_minutes_per_type() {
        assert_eq!(ReviewType::FullQuiz.estimated_minutes(), 10);
        assert_eq!(ReviewType::QuickQuiz.estimated_minutes(), 5);
        assert_eq!(ReviewType::ConnectionPrompt.estimated_minutes(), 3);
        assert_eq!(ReviewType::ApplicationChallenge.estimated_minutes(), 5);
    }

    proptest! {
        #[test]
        fn schedule_is_monotonic(a in 0u8..=100, b in 0u8..=100) {
            let s = ReviewScheduler::new();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(s.schedule(score(lo)).interval_days <= s.schedule(score(hi)).interval_days);
        }

        #[test]
        fn schedule_returns_a_known_tier(v in 0u8..=100) {
            let plan = ReviewScheduler::new().schedule(score(v));
            prop_assert!([FULL_QUIZ, QUICK_QUIZ, CONNECTION_PROMPT, APPLICATION_CHALLENGE].contains(&plan));
        }
    }
}
