mod ids;
mod progress;
mod quiz;
mod session;
mod stage;
mod xp;

pub use ids::{LabId, LabIdError, RunId};
pub use progress::{
    AwardKind, CompletionRecord, LedgerError, ProgressLedger, StagedAward, XpAward,
};
pub use quiz::{
    AnswerEdit, AnswerKey, Answers, Feedback, FeedbackLevel, MAX_INCORRECT_ATTEMPTS, QuizError,
    QuizState, SubmitOutcome, Verdict,
};
pub use session::{AdvanceRequest, NarrationAck, PendingAdvance, StageController, TransitionError};
pub use stage::{StageGraph, StageGraphError, StageName};
pub use xp::{Score, ScoreError, XpPolicy, XpPolicyDraft, XpPolicyError};
