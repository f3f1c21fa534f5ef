use std::sync::Arc;

use chrono::{DateTime, Utc};
use learn_core::model::{
    AdvanceRequest, AnswerEdit, Answers, AwardKind, NarrationAck, QuizState, RunId, Score,
    StageController, StageName, SubmitOutcome, Verdict, XpAward,
};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::Clock;
use crate::error::LabError;
use crate::labs::LabDefinition;
use crate::progress_service::ProgressService;

/// Result of one quiz submission made through a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSubmission {
    pub outcome: SubmitOutcome,
    /// Set when this submission passed the quiz and the XP was recorded.
    pub award: Option<XpAward>,
}

/// One learner's pass through a lab.
///
/// Owns the stage controller and quiz state for the run and forwards a passed
/// quiz to the shared `ProgressService`. All methods take `&mut self`; callers
/// drive the run from a single task.
pub struct LabRunner {
    run_id: RunId,
    definition: Arc<LabDefinition>,
    controller: StageController<StageName>,
    quiz: QuizState,
    progress: Arc<ProgressService>,
    clock: Clock,
    started_at: DateTime<Utc>,
    already_completed: bool,
    last_award: Option<XpAward>,
}

impl LabRunner {
    /// Open a run at the lab's initial stage and narrate its intro.
    pub async fn start(
        definition: Arc<LabDefinition>,
        progress: Arc<ProgressService>,
        clock: Clock,
    ) -> Self {
        let mut controller = StageController::new(definition.stages().clone());
        if !definition.intro_narration().is_empty() {
            controller.narrate(definition.intro_narration());
        }
        let already_completed = progress.is_completed(definition.lab_id()).await;
        let run_id = RunId::new();
        info!(
            %run_id,
            lab_id = %definition.lab_id(),
            stage = %controller.stage(),
            already_completed,
            "lab run started"
        );

        Self {
            run_id,
            started_at: clock.now(),
            definition,
            controller,
            quiz: QuizState::new(),
            progress,
            clock,
            already_completed,
            last_award: None,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    #[must_use]
    pub fn definition(&self) -> &LabDefinition {
        &self.definition
    }

    #[must_use]
    pub fn stage(&self) -> &StageName {
        self.controller.stage()
    }

    #[must_use]
    pub fn controller(&self) -> &StageController<StageName> {
        &self.controller
    }

    #[must_use]
    pub fn quiz(&self) -> &QuizState {
        &self.quiz
    }

    /// Text the narration collaborator should be presenting now.
    #[must_use]
    pub fn narration(&self) -> Option<&str> {
        self.controller.narration()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the lab had been completed before this run started.
    #[must_use]
    pub fn already_completed(&self) -> bool {
        self.already_completed
    }

    #[must_use]
    pub fn last_award(&self) -> Option<&XpAward> {
        self.last_award.as_ref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.controller.is_at_terminal()
    }

    /// Replace the clock, e.g. to move a fixed clock forward in tests.
    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    //
    // ─── STAGES ────────────────────────────────────────────────────────────────
    //

    /// Queue a move to `next`, committed once `narration` has been presented.
    ///
    /// # Errors
    ///
    /// Returns `LabError::Transition` if `next` is unknown or not adjacent.
    pub fn advance(
        &mut self,
        next: StageName,
        narration: impl Into<String>,
    ) -> Result<AdvanceRequest, LabError> {
        let to = next.clone();
        match self.controller.request_advance(next, narration) {
            Ok(AdvanceRequest::Queued) => {
                debug!(run_id = %self.run_id, from = %self.controller.stage(), %to, "advance queued");
                Ok(AdvanceRequest::Queued)
            }
            Ok(AdvanceRequest::AlreadyPending) => {
                debug!(run_id = %self.run_id, %to, "advance ignored, one is already pending");
                Ok(AdvanceRequest::AlreadyPending)
            }
            Err(err) => {
                warn!(run_id = %self.run_id, error = %err, "advance rejected");
                Err(err.into())
            }
        }
    }

    /// Queue a move to the stage after the current one.
    ///
    /// # Errors
    ///
    /// Returns `LabError::FinalStage` at the terminal stage.
    pub fn advance_to_next(
        &mut self,
        narration: impl Into<String>,
    ) -> Result<AdvanceRequest, LabError> {
        let next = self
            .controller
            .graph()
            .successor(self.controller.stage())
            .cloned()
            .ok_or(LabError::FinalStage)?;
        self.advance(next, narration)
    }

    /// The narration collaborator finished speaking.
    pub fn narration_finished(&mut self) -> NarrationAck<StageName> {
        let ack = self.controller.on_narration_complete();
        match &ack {
            NarrationAck::Committed { from, to } => {
                info!(run_id = %self.run_id, %from, %to, "stage committed");
            }
            NarrationAck::Stale => {
                debug!(run_id = %self.run_id, "stale narration completion ignored");
            }
        }
        ack
    }

    /// Narrate `text` without moving. Returns `false` while an advance is pending.
    pub fn narrate(&mut self, text: impl Into<String>) -> bool {
        self.controller.narrate(text)
    }

    /// Start the lab over from its initial stage with a fresh quiz.
    pub fn restart(&mut self) {
        self.controller.reset();
        self.reopen();
    }

    /// Start over at `stage` with a fresh quiz.
    ///
    /// # Errors
    ///
    /// Returns `LabError::Transition` if `stage` is not part of the lab; the
    /// run is untouched in that case.
    pub fn restart_at(&mut self, stage: StageName) -> Result<(), LabError> {
        self.controller.reset_to(stage)?;
        self.reopen();
        Ok(())
    }

    fn reopen(&mut self) {
        self.quiz.reset();
        self.last_award = None;
        self.started_at = self.clock.now();
        if !self.definition.intro_narration().is_empty() {
            self.controller.narrate(self.definition.intro_narration());
        }
        info!(run_id = %self.run_id, stage = %self.controller.stage(), "lab run restarted");
    }

    //
    // ─── QUIZ ──────────────────────────────────────────────────────────────────
    //

    fn ensure_quiz_stage(&self) -> Result<(), LabError> {
        if self.controller.stage() != self.definition.quiz_stage() {
            return Err(LabError::NotInQuizStage {
                stage: self.controller.stage().to_string(),
            });
        }
        if self.controller.has_pending() {
            return Err(LabError::AdvancePending);
        }
        Ok(())
    }

    /// Select `choice` for question `index`.
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotInQuizStage` outside the quiz stage, or
    /// `LabError::AdvancePending` while a move out of it awaits narration.
    pub fn change_answer(
        &mut self,
        index: usize,
        choice: impl Into<String>,
    ) -> Result<AnswerEdit, LabError> {
        self.ensure_quiz_stage()?;
        Ok(self.quiz.change_answer(index, choice))
    }

    /// Submit `answers` to the quiz.
    ///
    /// A correct verdict records the completion with the shared progress
    /// service before returning.
    ///
    /// # Errors
    ///
    /// Returns `LabError::NotInQuizStage` outside the quiz stage,
    /// `LabError::AdvancePending` while a move out of it awaits narration, or
    /// `LabError::Progress` if the award could not be recorded. In the latter
    /// case the quiz stays passed and `finalize_award` retries the award.
    pub async fn submit_quiz(&mut self, answers: Answers) -> Result<QuizSubmission, LabError> {
        self.ensure_quiz_stage()?;
        let outcome = self.quiz.submit(answers, self.definition.answer_key());
        self.settle(outcome).await
    }

    /// Submit the answers collected through `change_answer`.
    ///
    /// # Errors
    ///
    /// Same as `submit_quiz`.
    pub async fn submit_current_answers(&mut self) -> Result<QuizSubmission, LabError> {
        self.ensure_quiz_stage()?;
        let outcome = self.quiz.submit_current(self.definition.answer_key());
        self.settle(outcome).await
    }

    /// Record the award for a passed quiz whose award has not been recorded yet.
    ///
    /// # Errors
    ///
    /// Returns `LabError::QuizNotPassed` unless the quiz verdict is correct, or
    /// `LabError::Progress` if recording fails again.
    pub async fn finalize_award(&mut self) -> Result<XpAward, LabError> {
        if self.quiz.verdict() != Verdict::Correct {
            return Err(LabError::QuizNotPassed);
        }
        if let Some(award) = &self.last_award {
            return Ok(award.clone());
        }
        self.record_award().await
    }

    async fn settle(&mut self, outcome: SubmitOutcome) -> Result<QuizSubmission, LabError> {
        if outcome == SubmitOutcome::Rejected {
            debug!(run_id = %self.run_id, "submission ignored, quiz is closed");
            return Ok(QuizSubmission {
                outcome,
                award: None,
            });
        }
        if let SubmitOutcome::Evaluated {
            verdict, attempts, ..
        } = &outcome
        {
            info!(run_id = %self.run_id, ?verdict, attempts, "quiz evaluated");
        }

        if outcome.verdict() == Some(Verdict::Correct) {
            let award = self.record_award().await?;
            return Ok(QuizSubmission {
                outcome,
                award: Some(award),
            });
        }

        if let Some(feedback) = outcome.feedback() {
            self.controller.narrate(feedback.text.clone());
        }
        Ok(QuizSubmission {
            outcome,
            award: None,
        })
    }

    async fn record_award(&mut self) -> Result<XpAward, LabError> {
        let score = Score::from_attempts(self.quiz.attempts());
        let time_spent = self.clock.elapsed_secs(self.started_at);
        let span = info_span!("lab_run", run_id = %self.run_id, lab_id = %self.definition.lab_id());
        let award = self
            .progress
            .award_completion(self.definition.lab_id(), score, time_spent)
            .instrument(span)
            .await?;

        let text = match award.kind {
            AwardKind::FirstCompletion => format!(
                "Outstanding! You earned {} XP - your total is now {} XP!",
                award.xp, award.total_xp_after
            ),
            AwardKind::Replay => format!(
                "Nice practice! You earned {} replay XP - your total is now {} XP!",
                award.xp, award.total_xp_after
            ),
        };
        if !self.controller.narrate(text) {
            debug!(run_id = %self.run_id, "award narration skipped, an advance is pending");
        }
        self.last_award = Some(award.clone());
        Ok(award)
    }
}
