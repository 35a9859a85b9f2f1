#![forbid(unsafe_code)]

pub mod app_services;
pub mod briefing;
pub mod detection;
pub mod error;
pub mod nudge_inbox;
pub mod nudge_writer;
pub mod progress;
pub mod quiz_service;
pub mod resource_service;

pub use coach_core::Clock;

pub use app_services::{AppConfig, AppServices};
pub use briefing::{BriefingReport, BriefingService, compose};
pub use detection::{DetectionReport, NudgeEngine, ResourceSummary};
pub use error::{
    AppServicesError, NudgeInboxError, NudgeTextError, QuizServiceError, ResourceServiceError,
};
pub use nudge_inbox::NudgeInbox;
pub use nudge_writer::{LlmConfig, LlmNudgeWriter, NudgeContext, NudgeWriter, TemplateNudgeWriter};
pub use quiz_service::{QuizAnswerOutcome, QuizService};
pub use resource_service::ResourceService;
