use std::sync::Arc;

use chrono::Duration;
use coach_core::model::{
    LearningPath, QuestionResult, QuizQuestion, ResourceId, ResourceRecord, RiskLevel,
};
use coach_core::time::{fixed_now, fixed_today};
use services::{AppServices, Clock, TemplateNudgeWriter};
use storage::repository::{LearningPathRepository, ResourceRepository, Storage};

fn stale(path: &str, title: &str, days: i64) -> ResourceRecord {
    ResourceRecord::new(ResourceId::new(path), title)
        .with_last_reviewed(Some(fixed_today() - Duration::days(days)))
        .with_hours(2.0, 10.0)
        .with_learning_path("Systems")
}

async fn seeded() -> (AppServices, Storage) {
    let storage = Storage::in_memory();
    for record in [
        stale("04_resources/rust.md", "Rust Book", 14),
        stale("04_resources/tokio.md", "Tokio Tutorial", 7),
        stale("04_resources/serde.md", "Serde Guide", 1),
    ] {
        storage.resources.upsert_resource(&record).await.unwrap();
    }
    storage
        .learning_paths
        .upsert_learning_path(&LearningPath::new("Systems").with_progress(20))
        .await
        .unwrap();

    let services = AppServices::new(&storage, Clock::fixed(fixed_now()), Arc::new(TemplateNudgeWriter));
    (services, storage)
}

#[tokio::test]
async fn detection_is_idempotent() {
    let (services, storage) = seeded().await;

    let first = services.detection().run_now().await;
    assert_eq!(first.scanned, 3);
    assert_eq!(first.at_risk_count, 2);
    assert_eq!(first.nudges_created, 1);

    let second = services.detection().run_now().await;
    assert_eq!(second.at_risk_count, 2);
    assert_eq!(second.nudges_created, 0);
    let rust = second
        .resources
        .iter()
        .find(|r| r.resource_id.as_str() == "04_resources/rust.md")
        .unwrap();
    assert!(rust.nudge_pending);
    assert!(!rust.nudge_sent);

    let stored = storage
        .resources
        .get_resource(&ResourceId::new("04_resources/rust.md"))
        .await
        .unwrap();
    assert_eq!(stored.abandonment_risk, RiskLevel::High);
}

#[tokio::test]
async fn briefing_reflects_detection_and_delivery() {
    let (services, _) = seeded().await;
    services.detection().run_now().await;

    let report = services.briefing().today().await;
    assert_eq!(report.date, fixed_today());
    assert_eq!(report.stats.active_resources, 3);
    assert_eq!(report.stats.at_risk_count, 2);
    assert_eq!(report.nudges.len(), 1);
    assert!(report.nudges[0].message.contains("\"Rust Book\""));
    assert_eq!(report.progress.path_name.as_deref(), Some("Systems"));
    assert!((report.progress.target_hours - 5.0).abs() < f64::EPSILON);
    assert!((report.progress.behind_by - 5.0).abs() < f64::EPSILON);

    let ids: Vec<_> = report.nudges.iter().map(|n| n.id).collect();
    assert_eq!(services.inbox().mark_delivered(&ids).await.unwrap(), 1);
    assert!(services.briefing().today().await.nudges.is_empty());
}

#[tokio::test]
async fn completed_quiz_clears_risk_and_counts_toward_the_week() {
    let (services, _) = seeded().await;
    let id = ResourceId::new("04_resources/rust.md");

    let session = services
        .quizzes()
        .start_quiz(&id, vec![QuizQuestion::recall("What does the borrow checker enforce?")])
        .await
        .unwrap();
    let outcome = services
        .quizzes()
        .answer(session.id(), 0, QuestionResult::correct())
        .await
        .unwrap();
    assert!(outcome.quiz_complete);
    assert_eq!(outcome.final_score, Some(100));
    // 0.4 * 50 + 0.6 * 100
    assert_eq!(outcome.retention_updated.map(|s| s.value()), Some(80));

    let report = services.briefing().today().await;
    assert!(report.at_risk.iter().all(|r| r.resource_id != id));
    assert_eq!(report.streaks.map(|s| s.current), Some(1));

    let detection = services.detection().run_now().await;
    assert_eq!(detection.nudges_created, 0);
}
