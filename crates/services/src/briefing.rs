use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use coach_core::Clock;
use coach_core::model::{
    CompletionStatus, LearningPath, Nudge, ResourceId, ResourceRecord, RetentionScore, RiskLevel,
};
use coach_core::risk::classify_record;
use coach_core::scheduler::{ReviewScheduler, ReviewType};
use storage::repository::{
    LearningLogRepository, LearningPathRepository, NudgeRepository, ResourceRepository,
};

use crate::progress::{self, Streaks};

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewDue {
    pub resource_id: ResourceId,
    pub title: String,
    pub retention_score: RetentionScore,
    pub review_type: ReviewType,
    pub estimated_minutes: u32,
    pub last_reviewed: Option<NaiveDate>,
    pub next_review: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtRiskResource {
    pub resource_id: ResourceId,
    pub title: String,
    pub risk_level: RiskLevel,
    pub days_inactive: i64,
    pub completion_status: CompletionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathProgress {
    pub path_name: Option<String>,
    pub target_hours: f64,
    pub actual_hours: f64,
    pub behind_by: f64,
    pub overall_progress: u8,
    pub current_milestone: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BriefingStats {
    pub active_resources: usize,
    pub at_risk_count: usize,
    pub reviews_count: usize,
}

/// The learner's plan for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefingReport {
    pub date: NaiveDate,
    /// Weakest first.
    pub reviews_due: Vec<ReviewDue>,
    /// Highest risk first, then longest inactive.
    pub at_risk: Vec<AtRiskResource>,
    pub nudges: Vec<Nudge>,
    pub progress: PathProgress,
    pub stats: BriefingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaks: Option<Streaks>,
}

//
// ─── COMPOSE ───────────────────────────────────────────────────────────────────
//

/// Build the daily briefing from already-loaded inputs. Reads only.
#[must_use]
pub fn compose(
    resources: &[ResourceRecord],
    learning_path: Option<&LearningPath>,
    weekly_hours_actual: f64,
    pending_nudges: &[Nudge],
    today: NaiveDate,
) -> BriefingReport {
    let scheduler = ReviewScheduler::new();

    let mut due: Vec<&ResourceRecord> = resources
        .iter()
        .filter(|r| r.next_review.is_some_and(|d| d <= today))
        .collect();
    // stable: equal scores keep input order
    due.sort_by_key(|r| r.retention_score);

    let reviews_due: Vec<ReviewDue> = due
        .into_iter()
        .filter_map(|r| {
            let next_review = r.next_review?;
            let plan = scheduler.schedule(r.retention_score);
            Some(ReviewDue {
                resource_id: r.id.clone(),
                title: r.title.clone(),
                retention_score: r.retention_score,
                review_type: plan.review_type,
                estimated_minutes: plan.review_type.estimated_minutes(),
                last_reviewed: r.last_reviewed,
                next_review,
            })
        })
        .collect();

    let mut at_risk: Vec<AtRiskResource> = resources
        .iter()
        .filter_map(|r| {
            let assessment = classify_record(r, today);
            (assessment.level >= RiskLevel::Medium).then(|| AtRiskResource {
                resource_id: r.id.clone(),
                title: r.title.clone(),
                risk_level: assessment.level,
                days_inactive: assessment.days_inactive,
                completion_status: r.completion_status,
            })
        })
        .collect();
    at_risk.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then(b.days_inactive.cmp(&a.days_inactive))
    });

    let actual = if weekly_hours_actual.is_finite() {
        weekly_hours_actual.max(0.0)
    } else {
        0.0
    };
    let progress = match learning_path {
        Some(path) => PathProgress {
            path_name: Some(path.name.clone()),
            target_hours: path.weekly_target_hours,
            actual_hours: actual,
            behind_by: (path.weekly_target_hours - actual).max(0.0),
            overall_progress: path.overall_progress,
            current_milestone: path.current_milestone.clone(),
        },
        None => PathProgress {
            path_name: None,
            target_hours: 0.0,
            actual_hours: actual,
            behind_by: 0.0,
            overall_progress: 0,
            current_milestone: None,
        },
    };

    let stats = BriefingStats {
        active_resources: resources
            .iter()
            .filter(|r| r.learning_status.is_tracked())
            .count(),
        at_risk_count: at_risk.len(),
        reviews_count: reviews_due.len(),
    };

    BriefingReport {
        date: today,
        reviews_due,
        at_risk,
        nudges: pending_nudges.to_vec(),
        progress,
        stats,
        streaks: None,
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Gathers briefing inputs from storage. Never fails: unavailable inputs are
/// logged and treated as empty.
#[derive(Clone)]
pub struct BriefingService {
    clock: Clock,
    resources: Arc<dyn ResourceRepository>,
    learning_paths: Arc<dyn LearningPathRepository>,
    nudges: Arc<dyn NudgeRepository>,
    logs: Arc<dyn LearningLogRepository>,
}

impl BriefingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        resources: Arc<dyn ResourceRepository>,
        learning_paths: Arc<dyn LearningPathRepository>,
        nudges: Arc<dyn NudgeRepository>,
        logs: Arc<dyn LearningLogRepository>,
    ) -> Self {
        Self {
            clock,
            resources,
            learning_paths,
            nudges,
            logs,
        }
    }

    pub async fn today(&self) -> BriefingReport {
        let today = self.clock.today();

        let resources = self.resources.active_resources().await.unwrap_or_else(|e| {
            warn!(error = %e, "briefing: resources unavailable");
            Vec::new()
        });
        let path = self.learning_paths.learning_path().await.unwrap_or_else(|e| {
            warn!(error = %e, "briefing: learning path unavailable");
            None
        });
        let nudges = self.nudges.pending_nudges(None).await.unwrap_or_else(|e| {
            warn!(error = %e, "briefing: nudges unavailable");
            Vec::new()
        });

        // streaks need history beyond the current week
        let (week_start, week_end) = progress::week_bounds(today);
        let history_start = week_start - chrono::Duration::days(90);
        let logs = self
            .logs
            .logs_between(history_start, week_end)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "briefing: learning logs unavailable");
                Vec::new()
            });

        let weekly = progress::weekly_hours(&logs, today);
        let mut report = compose(&resources, path.as_ref(), weekly, &nudges, today);
        report.streaks = Some(progress::streaks(&logs, today));

        info!(
            reviews = report.stats.reviews_count,
            at_risk = report.stats.at_risk_count,
            nudges = report.nudges.len(),
            "briefing composed"
        );
        report
    }
}
