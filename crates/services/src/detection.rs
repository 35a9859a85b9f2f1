use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use coach_core::Clock;
use coach_core::model::{NewNudge, ResourceId, ResourceRecord, ResourceUpdate, RiskLevel};
use coach_core::risk::{RiskAssessment, classify_record};
use storage::repository::{NudgeRepository, ResourceRepository};

use crate::nudge_writer::{NudgeContext, NudgeWriter};

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

/// Outcome for one at-risk resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSummary {
    pub resource_id: ResourceId,
    pub title: String,
    pub risk_level: RiskLevel,
    pub days_inactive: i64,
    /// A nudge was created during this pass.
    pub nudge_sent: bool,
    /// A nudge from an earlier pass is still undelivered, so none was created.
    pub nudge_pending: bool,
}

/// Result of one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    /// Tracked (active or paused) resources examined.
    pub scanned: usize,
    pub at_risk_count: usize,
    pub nudges_created: usize,
    pub resources: Vec<ResourceSummary>,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Classifies tracked resources, persists their risk and raises abandonment nudges.
///
/// Holds no state between passes. Every write is idempotent, so a pass can
/// be stopped between resources and rerun.
#[derive(Clone)]
pub struct NudgeEngine {
    clock: Clock,
    resources: Arc<dyn ResourceRepository>,
    nudges: Arc<dyn NudgeRepository>,
    writer: Arc<dyn NudgeWriter>,
}

impl NudgeEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        resources: Arc<dyn ResourceRepository>,
        nudges: Arc<dyn NudgeRepository>,
        writer: Arc<dyn NudgeWriter>,
    ) -> Self {
        Self {
            clock,
            resources,
            nudges,
            writer,
        }
    }

    /// Load tracked resources from the store and run a pass for today.
    ///
    /// A store failure is logged and yields an empty report.
    pub async fn run_now(&self) -> DetectionReport {
        let today = self.clock.today();
        match self.resources.active_resources().await {
            Ok(resources) => self.run(&resources, today).await,
            Err(e) => {
                error!(error = %e, "failed to load resources for abandonment detection");
                DetectionReport::default()
            }
        }
    }

    /// Run one detection pass over `resources` as of `today`.
    pub async fn run(&self, resources: &[ResourceRecord], today: NaiveDate) -> DetectionReport {
        let mut report = DetectionReport::default();

        for resource in resources.iter().filter(|r| r.learning_status.is_tracked()) {
            report.scanned += 1;

            let assessment = classify_record(resource, today);
            if assessment.level == RiskLevel::Low {
                continue;
            }

            if let Err(e) = self
                .resources
                .update_resource(&resource.id, &ResourceUpdate::risk(assessment.level))
                .await
            {
                error!(resource = %resource.id, error = %e, "failed to persist risk level");
                continue;
            }

            let mut summary = ResourceSummary {
                resource_id: resource.id.clone(),
                title: resource.title.clone(),
                risk_level: assessment.level,
                days_inactive: assessment.days_inactive,
                nudge_sent: false,
                nudge_pending: false,
            };

            if assessment.level == RiskLevel::High {
                self.nudge(resource, assessment, &mut summary).await;
                if summary.nudge_sent {
                    report.nudges_created += 1;
                }
            }

            report.resources.push(summary);
        }

        report.at_risk_count = report.resources.len();

        info!(
            scanned = report.scanned,
            at_risk = report.at_risk_count,
            nudges_created = report.nudges_created,
            "abandonment detection completed"
        );

        report
    }

    async fn nudge(
        &self,
        resource: &ResourceRecord,
        assessment: RiskAssessment,
        summary: &mut ResourceSummary,
    ) {
        match self.nudges.undelivered_nudge(&resource.id).await {
            Ok(Some(_)) => {
                summary.nudge_pending = true;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                error!(resource = %resource.id, error = %e, "failed to check pending nudges");
                return;
            }
        }

        let ctx = NudgeContext {
            title: resource.title.clone(),
            days_inactive: assessment.days_inactive,
            key_insights: resource.key_insights.clone(),
            learning_path: resource.learning_path.clone(),
        };

        let message = match self.writer.generate_nudge(&ctx).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                warn!(resource = %resource.id, "nudge writer produced no text");
                return;
            }
            Err(e) => {
                error!(resource = %resource.id, error = %e, "failed to generate nudge text");
                return;
            }
        };

        let new = NewNudge::abandonment(resource.id.clone(), message, self.clock.now());
        match self.nudges.insert_nudge_if_none_pending(new).await {
            Ok(Some(nudge)) => {
                info!(resource = %resource.id, nudge_id = %nudge.id, "stored abandonment nudge");
                summary.nudge_sent = true;
            }
            Ok(None) => summary.nudge_pending = true,
            Err(e) => {
                error!(resource = %resource.id, error = %e, "failed to store nudge");
            }
        }
    }
}
