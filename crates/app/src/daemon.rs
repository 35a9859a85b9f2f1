use std::sync::Arc;

use services::AppServices;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

const DEFAULT_DETECTION_SCHEDULE: &str = "0 0 20 * * *";
const DEFAULT_BRIEFING_SCHEDULE: &str = "0 0 7 * * *";

/// Cron expressions (with seconds) for the recurring jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedules {
    pub detection: String,
    pub briefing: String,
}

impl Default for Schedules {
    fn default() -> Self {
        Self {
            detection: DEFAULT_DETECTION_SCHEDULE.to_string(),
            briefing: DEFAULT_BRIEFING_SCHEDULE.to_string(),
        }
    }
}

impl Schedules {
    /// Read `COACH_DETECTION_SCHEDULE` and `COACH_BRIEFING_SCHEDULE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detection: std::env::var("COACH_DETECTION_SCHEDULE").unwrap_or(defaults.detection),
            briefing: std::env::var("COACH_BRIEFING_SCHEDULE").unwrap_or(defaults.briefing),
        }
    }
}

/// Run detection and the briefing on their schedules until Ctrl-C.
pub async fn run(services: &AppServices, schedules: &Schedules) -> Result<(), JobSchedulerError> {
    let mut scheduler = JobScheduler::new().await?;

    let detection = services.detection();
    let job = Job::new_async(schedules.detection.as_str(), move |_uuid, _lock| {
        let detection = Arc::clone(&detection);
        Box::pin(async move {
            let report = detection.run_now().await;
            info!(
                scanned = report.scanned,
                at_risk = report.at_risk_count,
                nudges_created = report.nudges_created,
                "scheduled detection finished"
            );
        })
    })?;
    scheduler.add(job).await?;
    info!(schedule = %schedules.detection, "abandonment detection scheduled");

    let briefing = services.briefing();
    let job = Job::new_async(schedules.briefing.as_str(), move |_uuid, _lock| {
        let briefing = Arc::clone(&briefing);
        Box::pin(async move {
            let report = briefing.today().await;
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "failed to render briefing"),
            }
        })
    })?;
    scheduler.add(job).await?;
    info!(schedule = %schedules.briefing, "daily briefing scheduled");

    scheduler.start().await?;
    info!("daemon running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
    scheduler.shutdown().await
}
