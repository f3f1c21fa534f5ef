use thiserror::Error;

use crate::model::{
    LabIdError, LedgerError, QuizError, ScoreError, StageGraphError, TransitionError,
    XpPolicyError,
};

/// Any error raised by the core model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    LabId(#[from] LabIdError),
    #[error(transparent)]
    StageGraph(#[from] StageGraphError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    XpPolicy(#[from] XpPolicyError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
