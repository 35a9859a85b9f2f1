use thiserror::Error;

use crate::model::{QuestionResult, RetentionScore};

/// Weight of the latest quiz performance in the blended score.
pub const DEFAULT_RECENT_WEIGHT: f64 = 0.6;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub enum ScoringError {
    #[error("recent-performance weight must be within (0, 1], got {0}")]
    InvalidWeight(f64),
}

/// Blends a previous retention score with fresh quiz results.
///
/// `new = round((1 - w) * previous + w * mean(question scores))`, clamped to
/// 0..=100, where `w` is the recent-performance weight (0.6 by default).
///
/// # Examples
///
/// ```
/// # use coach_core::model::{QuestionResult, RetentionScore};
/// # use coach_core::retention::RetentionScorer;
/// let scorer = RetentionScorer::default();
/// let prev = RetentionScore::new(50).unwrap();
/// let results = [QuestionResult::correct(), QuestionResult::correct()];
/// assert_eq!(scorer.score(prev, &results).value(), 80);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionScorer {
    recent_weight: f64,
}

impl Default for RetentionScorer {
    fn default() -> Self {
        Self {
            recent_weight: DEFAULT_RECENT_WEIGHT,
        }
    }
}

impl RetentionScorer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `ScoringError::InvalidWeight` unless `0 < weight <= 1`.
    pub fn try_with_weight(weight: f64) -> Result<Self, ScoringError> {
        if !weight.is_finite() || weight <= 0.0 || weight > 1.0 {
            return Err(ScoringError::InvalidWeight(weight));
        }
        Ok(Self {
            recent_weight: weight,
        })
    }

    #[must_use]
    pub fn recent_weight(&self) -> f64 {
        self.recent_weight
    }

    /// Compute the new score. An empty result list leaves `previous` unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the blended value is not a number.
    #[must_use]
    pub fn score(&self, previous: RetentionScore, results: &[QuestionResult]) -> RetentionScore {
        if results.is_empty() {
            return previous;
        }

        let total: f64 = results.iter().map(|r| f64::from(r.score())).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total / results.len() as f64;
        let blended = (1.0 - self.recent_weight) * f64::from(previous.value())
            + self.recent_weight * mean;

        let clamped = blended.round().clamp(0.0, 100.0);
        assert!(
            (0.0..=100.0).contains(&clamped),
            "blended retention score {blended} escaped 0..=100"
        );
        #[allow(clippy::cast_possible_truncation)]
        let rounded = clamped as i64;
        RetentionScore::saturating(rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn score(v: u8) -> RetentionScore {
        RetentionScore::new(v).unwrap()
    }

    #[test]
    fn empty_results_keep_previous() {
        let scorer = RetentionScorer::default();
        assert_eq!(scorer.score(score(73), &[]), score(73));
    }

    #[test]
    fn blends_previous_with_mean() {
        let scorer = RetentionScorer::default();
        // 0.4 * 50 + 0.6 * 100
        assert_eq!(scorer.score(score(50), &[QuestionResult::correct()]), score(80));
        // 0.4 * 50 + 0.6 * 0
        assert_eq!(scorer.score(score(50), &[QuestionResult::incorrect()]), score(20));
        // 0.4 * 50 + 0.6 * 50
        let mixed = [QuestionResult::correct(), QuestionResult::incorrect()];
        assert_eq!(scorer.score(score(50), &mixed), score(50));
    }

    #[test]
    fn partial_credit_feeds_the_mean() {
        let scorer = RetentionScorer::default();
        let results = [QuestionResult::partial(false, 75).unwrap()];
        // 0.4 * 0 + 0.6 * 75 = 45
        assert_eq!(scorer.score(score(0), &results), score(45));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        let scorer = RetentionScorer::default();
        // 0.4 * 1 + 0.6 * 0 = 0.4 -> 0
        assert_eq!(scorer.score(score(1), &[QuestionResult::incorrect()]), score(0));
        // 0.4 * 5 + 0.6 * 0 = 2.0
        assert_eq!(scorer.score(score(5), &[QuestionResult::incorrect()]), score(2));
        // 0.4 * 99 + 0.6 * 100 = 99.6 -> 100
        assert_eq!(scorer.score(score(99), &[QuestionResult::correct()]), score(100));
    }

    #[test]
    fn weight_must_be_in_unit_interval() {
        assert!(RetentionScorer::try_with_weight(0.0).is_err());
        assert!(RetentionScorer::try_with_weight(1.2).is_err());
        assert!(RetentionScorer::try_with_weight(f64::NAN).is_err());

        let only_recent = RetentionScorer::try_with_weight(1.0).unwrap();
        assert_eq!(only_recent.score(score(10), &[QuestionResult::correct()]), score(100));
    }

    proptest! {
        #[test]
        fn score_stays_in_range(
            prev in 0u8..=100,
            answers in prop::collection::vec((any::<bool>(), prop::option::of(0u8..=100)), 0..20),
        ) {
            let results: Vec<QuestionResult> = answers
                .into_iter()
                .map(|(correct, partial_credit)| QuestionResult { correct, partial_credit })
                .collect();
            let s = RetentionScorer::default().score(score(prev), &results);
            prop_assert!(s.value() <= 100);
        }

        #[test]
        fn all_correct_never_lowers_score(prev in 0u8..=100, n in 1usize..10) {
            let results = vec![QuestionResult::correct(); n];
            let s = RetentionScorer::default().score(score(prev), &results);
            prop_assert!(s >= score(prev));
        }
    }
}
