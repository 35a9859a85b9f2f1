//! Shared error types for the services crate.

use thiserror::Error;

use coach_core::model::{QuizError, StatusTransitionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use storage::vault::VaultError;

/// Errors emitted by nudge text generators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NudgeTextError {
    #[error("nudge text generation is not configured")]
    Disabled,
    #[error("nudge text request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ResourceService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResourceServiceError {
    #[error(transparent)]
    Transition(#[from] StatusTransitionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `NudgeInbox`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NudgeInboxError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}
