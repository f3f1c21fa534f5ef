//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::{LedgerError, TransitionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("award task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors emitted while validating a `LabDefinitionDraft`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LabDefinitionError {
    #[error("lab title cannot be empty")]
    EmptyTitle,
    #[error("quiz stage {0} is not one of the lab's stages")]
    UnknownQuizStage(String),
    #[error(transparent)]
    Invalid(#[from] learn_core::Error),
}

/// Errors emitted by `LabRunner`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LabError {
    #[error("quiz actions are only available in the quiz stage (current stage: {stage})")]
    NotInQuizStage { stage: String },
    #[error("a stage change is waiting for narration to finish")]
    AdvancePending,
    #[error("already at the final stage")]
    FinalStage,
    #[error("quiz has not been passed")]
    QuizNotPassed,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}
