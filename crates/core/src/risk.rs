use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{CompletionStatus, ResourceRecord, RiskLevel};

/// Days without review after which a resource is at least medium risk.
pub const MEDIUM_RISK_DAYS: i64 = 5;
/// Days without review after which an unfinished resource may be high risk.
pub const HIGH_RISK_DAYS: i64 = 10;
/// Investment ratio below which a stalled resource counts as high risk.
pub const LOW_INVESTMENT_RATIO: f64 = 0.5;

/// Raw facts the classifier looks at. Never includes a previously stored risk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInputs {
    pub last_reviewed: Option<NaiveDate>,
    pub completion_status: CompletionStatus,
    pub hours_invested: f64,
    pub estimated_hours: f64,
}

impl RiskInputs {
    #[must_use]
    pub fn from_record(record: &ResourceRecord) -> Self {
        Self {
            last_reviewed: record.last_reviewed,
            completion_status: record.completion_status,
            hours_invested: record.hours_invested,
            estimated_hours: record.estimated_hours,
        }
    }

    /// Whole days since the last review. Zero when never reviewed or reviewed in the future.
    #[must_use]
    pub fn days_inactive(&self, today: NaiveDate) -> i64 {
        self.last_reviewed
            .map_or(0, |last| (today - last).num_days().max(0))
    }

    fn investment_ratio(&self) -> f64 {
        let invested = if self.hours_invested.is_finite() {
            self.hours_invested.max(0.0)
        } else {
            0.0
        };
        let estimated = if self.estimated_hours.is_finite() {
            self.estimated_hours.max(1.0)
        } else {
            1.0
        };
        invested / estimated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub days_inactive: i64,
}

/// Classify abandonment risk from raw facts.
///
/// - high: in progress, idle for more than 10 days, and under half the
///   estimated hours invested (estimates below one hour count as one)
/// - medium: idle for more than 5 days
/// - low: everything else
#[must_use]
pub fn classify(inputs: &RiskInputs, today: NaiveDate) -> RiskAssessment {
    let days_inactive = inputs.days_inactive(today);

    let level = if inputs.completion_status == CompletionStatus::InProgress
        && days_inactive > HIGH_RISK_DAYS
        && inputs.investment_ratio() < LOW_INVESTMENT_RATIO
    {
        RiskLevel::High
    } else if days_inactive > MEDIUM_RISK_DAYS {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        level,
        days_inactive,
    }
}

/// Shorthand for classifying a stored record.
#[must_use]
pub fn classify_record(record: &ResourceRecord, today: NaiveDate) -> RiskAssessment {
    classify(&RiskInputs::from_record(record), today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceId;
    use crate::time::fixed_today;
    use chrono::Duration;
    use proptest::prelude::*;

    fn inputs(days_ago: Option<i64>, status: CompletionStatus, invested: f64, estimated: f64) -> RiskInputs {
        RiskInputs {
            last_reviewed: days_ago.map(|d| fixed_today() - Duration::days(d)),
            completion_status: status,
            hours_invested: invested,
            estimated_hours: estimated,
        }
    }

    #[test]
    fn never_reviewed_is_low() {
        let a = classify(&inputs(None, CompletionStatus::InProgress, 0.0, 10.0), fixed_today());
        assert_eq!(a.level, RiskLevel::Low);
        assert_eq!(a.days_inactive, 0);
    }

    #[test]
    fn boundary_days() {
        let today = fixed_today();
        let at = |d| classify(&inputs(Some(d), CompletionStatus::InProgress, 0.0, 10.0), today).level;
        assert_eq!(at(5), RiskLevel::Low);
        assert_eq!(at(6), RiskLevel::Medium);
        assert_eq!(at(10), RiskLevel::Medium);
        assert_eq!(at(11), RiskLevel::High);
    }

    #[test]
    fn high_needs_low_investment() {
        let today = fixed_today();
        let a = classify(&inputs(Some(14), CompletionStatus::InProgress, 2.0, 10.0), today);
        assert_eq!(a.level, RiskLevel::High);
        assert_eq!(a.days_inactive, 14);

        let b = classify(&inputs(Some(14), CompletionStatus::InProgress, 5.0, 10.0), today);
        assert_eq!(b.level, RiskLevel::Medium);
    }

    #[test]
    fn eleven_days_at_thirty_percent_is_high() {
        let a = classify(&inputs(Some(11), CompletionStatus::InProgress, 3.0, 10.0), fixed_today());
        assert_eq!(a.level, RiskLevel::High);
        assert_eq!(a.days_inactive, 11);
    }

    #[test]
    fn completed_work_is_never_high() {
        let a = classify(&inputs(Some(40), CompletionStatus::Completed, 0.0, 10.0), fixed_today());
        assert_eq!(a.level, RiskLevel::Medium);
    }

    #[test]
    fn small_estimates_count_as_one_hour() {
        // ratio 0.4 / max(0.2, 1) = 0.4
        let a = classify(&inputs(Some(11), CompletionStatus::InProgress, 0.4, 0.2), fixed_today());
        assert_eq!(a.level, RiskLevel::High);
    }

    #[test]
    fn future_review_counts_as_zero_days() {
        let a = classify(&inputs(Some(-3), CompletionStatus::InProgress, 0.0, 10.0), fixed_today());
        assert_eq!(a.days_inactive, 0);
        assert_eq!(a.level, RiskLevel::Low);
    }

    #[test]
    fn stored_risk_does_not_influence_classification() {
        let mut record = ResourceRecord::new(ResourceId::new("a.md"), "A")
            .with_last_reviewed(Some(fixed_today() - Duration::days(2)));
        record.abandonment_risk = RiskLevel::High;
        assert_eq!(classify_record(&record, fixed_today()).level, RiskLevel::Low);
    }

    proptest! {
        #[test]
        fn high_implies_the_three_conditions(
            days in -20i64..60,
            invested in 0.0f64..50.0,
            estimated in 0.0f64..50.0,
            in_progress in any::<bool>(),
        ) {
            let status = if in_progress { CompletionStatus::InProgress } else { CompletionStatus::Completed };
            let i = inputs(Some(days), status, invested, estimated);
            let a = classify(&i, fixed_today());
            if a.level == RiskLevel::High {
                prop_assert!(in_progress);
                prop_assert!(a.days_inactive > HIGH_RISK_DAYS);
                prop_assert!(invested / estimated.max(1.0) < LOW_INVESTMENT_RATIO);
            }
            if a.days_inactive <= MEDIUM_RISK_DAYS {
                prop_assert_eq!(a.level, RiskLevel::Low);
            }
        }
    }
}
