use std::path::PathBuf;
use std::sync::Arc;

use storage::repository::Storage;
use storage::vault::VaultRepository;
use tracing::info;

use crate::Clock;
use crate::briefing::BriefingService;
use crate::detection::NudgeEngine;
use crate::error::AppServicesError;
use crate::nudge_inbox::NudgeInbox;
use crate::nudge_writer::{LlmConfig, LlmNudgeWriter, NudgeWriter, TemplateNudgeWriter};
use crate::quiz_service::QuizService;
use crate::resource_service::ResourceService;

/// Where the app keeps its data and how it writes nudges.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database_url: String,
    /// Read resources and the learning path from this markdown vault instead of `SQLite`.
    pub vault_dir: Option<PathBuf>,
    /// Use a chat-completions model for nudge text; the template otherwise.
    pub llm: Option<LlmConfig>,
}

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    detection: Arc<NudgeEngine>,
    briefing: Arc<BriefingService>,
    inbox: Arc<NudgeInbox>,
    quizzes: Arc<QuizService>,
    resources: Arc<ResourceService>,
}

impl AppServices {
    /// Open storage as described by `config` and build the services on it.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated,
    /// or the vault directory does not exist.
    pub async fn from_config(config: AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let mut storage = Storage::sqlite(&config.database_url).await?;
        if let Some(dir) = config.vault_dir {
            let vault = VaultRepository::open(dir)?;
            info!(vault = %vault.root().display(), "reading resources from vault");
            storage = storage.with_vault(vault);
        }

        let writer: Arc<dyn NudgeWriter> = match config.llm {
            Some(llm) => {
                info!(model = %llm.model, "nudge text from chat model");
                Arc::new(LlmNudgeWriter::new(Some(llm)))
            }
            None => Arc::new(TemplateNudgeWriter),
        };

        Ok(Self::new(&storage, clock, writer))
    }

    /// Build services over an existing `Storage`.
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock, writer: Arc<dyn NudgeWriter>) -> Self {
        let detection = Arc::new(NudgeEngine::new(
            clock,
            Arc::clone(&storage.resources),
            Arc::clone(&storage.nudges),
            writer,
        ));
        let briefing = Arc::new(BriefingService::new(
            clock,
            Arc::clone(&storage.resources),
            Arc::clone(&storage.learning_paths),
            Arc::clone(&storage.nudges),
            Arc::clone(&storage.learning_logs),
        ));
        let inbox = Arc::new(NudgeInbox::new(clock, Arc::clone(&storage.nudges)));
        let quizzes = Arc::new(QuizService::new(
            clock,
            Arc::clone(&storage.resources),
            Arc::clone(&storage.quiz_sessions),
            Arc::clone(&storage.learning_logs),
        ));
        let resources = Arc::new(ResourceService::new(Arc::clone(&storage.resources)));

        Self {
            detection,
            briefing,
            inbox,
            quizzes,
            resources,
        }
    }

    #[must_use]
    pub fn detection(&self) -> Arc<NudgeEngine> {
        Arc::clone(&self.detection)
    }

    #[must_use]
    pub fn briefing(&self) -> Arc<BriefingService> {
        Arc::clone(&self.briefing)
    }

    #[must_use]
    pub fn inbox(&self) -> Arc<NudgeInbox> {
        Arc::clone(&self.inbox)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizService> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn resources(&self) -> Arc<ResourceService> {
        Arc::clone(&self.resources)
    }
}
