use std::fmt;
use thiserror::Error;

use crate::model::stage::StageGraph;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected stage moves. The session is left untouched when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("cannot advance from {from} to {to}: stages are not adjacent")]
    InvalidTransition { from: String, to: String },

    #[error("stage {0} is not declared for this lab")]
    UnknownStage(String),
}

//
// ─── SIGNALS ───────────────────────────────────────────────────────────────────
//

/// A requested transition waiting for narration to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAdvance<S> {
    pub from: S,
    pub to: S,
}

/// Result of a well-formed advance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceRequest {
    /// Stored as pending; commits on the next narration completion.
    Queued,
    /// Another advance is already pending. Nothing changed; the caller waits.
    AlreadyPending,
}

/// What a narration-complete signal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationAck<S> {
    Committed { from: S, to: S },
    /// No advance was pending (flavour narration, or the advance was reset away).
    Stale,
}

impl<S> NarrationAck<S> {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, NarrationAck::Committed { .. })
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Stage state machine for one lab session.
///
/// Advancing is two-phase: `request_advance` stores the target and the message
/// to narrate, and `on_narration_complete` commits it. At most one advance is
/// pending at a time, so competing requests cannot race each other.
#[derive(Clone)]
pub struct StageController<S> {
    graph: StageGraph<S>,
    stage: S,
    pending: Option<PendingAdvance<S>>,
    narration: Option<String>,
}

impl<S> StageController<S>
where
    S: Clone + PartialEq + fmt::Debug,
{
    /// Open a session at the graph's initial stage.
    #[must_use]
    pub fn new(graph: StageGraph<S>) -> Self {
        let stage = graph.initial().clone();
        Self {
            graph,
            stage,
            pending: None,
            narration: None,
        }
    }

    #[must_use]
    pub fn graph(&self) -> &StageGraph<S> {
        &self.graph
    }

    #[must_use]
    pub fn stage(&self) -> &S {
        &self.stage
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingAdvance<S>> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn narration(&self) -> Option<&str> {
        self.narration.as_deref()
    }

    #[must_use]
    pub fn is_at_terminal(&self) -> bool {
        &self.stage == self.graph.terminal()
    }

    /// Ask to move to `next` once `narration` has been presented.
    ///
    /// A request made while another advance is pending is ignored and reported
    /// as `AdvanceRequest::AlreadyPending`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::UnknownStage` if `next` is not part of the lab,
    /// or `TransitionError::InvalidTransition` if it is neither the current
    /// stage nor its immediate successor.
    pub fn request_advance(
        &mut self,
        next: S,
        narration: impl Into<String>,
    ) -> Result<AdvanceRequest, TransitionError> {
        if self.pending.is_some() {
            return Ok(AdvanceRequest::AlreadyPending);
        }
        if !self.graph.contains(&next) {
            return Err(TransitionError::UnknownStage(format!("{next:?}")));
        }
        if !self.graph.is_adjacent(&self.stage, &next) {
            return Err(TransitionError::InvalidTransition {
                from: format!("{:?}", self.stage),
                to: format!("{next:?}"),
            });
        }

        self.narration = Some(narration.into());
        self.pending = Some(PendingAdvance {
            from: self.stage.clone(),
            to: next,
        });
        Ok(AdvanceRequest::Queued)
    }

    /// Narration finished: commit the pending advance, if there is one.
    pub fn on_narration_complete(&mut self) -> NarrationAck<S> {
        match self.pending.take() {
            Some(PendingAdvance { from, to }) => {
                self.stage = to.clone();
                NarrationAck::Committed { from, to }
            }
            None => NarrationAck::Stale,
        }
    }

    /// Set narration that does not move the session.
    ///
    /// Returns `false` and keeps the current text while an advance is pending,
    /// since that text is what gates the commit.
    pub fn narrate(&mut self, text: impl Into<String>) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.narration = Some(text.into());
        true
    }

    /// Drop any pending advance and return to the initial stage.
    pub fn reset(&mut self) {
        let initial = self.graph.initial().clone();
        self.restart_at(initial);
    }

    /// Drop any pending advance and restart at a declared stage.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::UnknownStage` if `stage` is not part of the
    /// lab; the session is not modified in that case.
    pub fn reset_to(&mut self, stage: S) -> Result<(), TransitionError> {
        if !self.graph.contains(&stage) {
            return Err(TransitionError::UnknownStage(format!("{stage:?}")));
        }
        self.restart_at(stage);
        Ok(())
    }

    fn restart_at(&mut self, stage: S) {
        self.pending = None;
        self.narration = None;
        self.stage = stage;
    }
}

impl<S: fmt::Debug> fmt::Debug for StageController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageController")
            .field("stage", &self.stage)
            .field("pending", &self.pending)
            .field("has_narration", &self.narration.is_some())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Stage {
        Intro,
        Setup,
        Quiz,
        Complete,
    }

    fn controller() -> StageController<Stage> {
        let graph =
            StageGraph::new([Stage::Intro, Stage::Setup, Stage::Quiz, Stage::Complete]).unwrap();
        StageController::new(graph)
    }

    #[test]
    fn advance_commits_only_after_narration() {
        let mut c = controller();
        assert_eq!(
            c.request_advance(Stage::Setup, "go").unwrap(),
            AdvanceRequest::Queued
        );
        assert_eq!(c.stage(), &Stage::Intro);
        assert_eq!(c.narration(), Some("go"));

        let ack = c.on_narration_complete();
        assert_eq!(
            ack,
            NarrationAck::Committed {
                from: Stage::Intro,
                to: Stage::Setup
            }
        );
        assert_eq!(c.stage(), &Stage::Setup);
        assert!(!c.has_pending());

        assert_eq!(c.on_narration_complete(), NarrationAck::Stale);
        assert_eq!(c.stage(), &Stage::Setup);
    }

    #[test]
    fn second_request_while_pending_is_ignored() {
        let mut c = controller();
        c.request_advance(Stage::Setup, "first").unwrap();
        assert_eq!(
            c.request_advance(Stage::Setup, "second").unwrap(),
            AdvanceRequest::AlreadyPending
        );
        assert_eq!(c.narration(), Some("first"));

        assert!(c.on_narration_complete().is_committed());
        assert_eq!(c.stage(), &Stage::Setup);
        assert_eq!(c.on_narration_complete(), NarrationAck::Stale);
        assert_eq!(c.stage(), &Stage::Setup);
    }

    #[test]
    fn pending_request_wins_over_target_validation() {
        let mut c = controller();
        c.request_advance(Stage::Setup, "first").unwrap();
        let before = c.pending().cloned();

        assert_eq!(
            c.request_advance(Stage::Complete, "skip").unwrap(),
            AdvanceRequest::AlreadyPending
        );
        assert_eq!(c.pending().cloned(), before);
        assert_eq!(c.stage(), &Stage::Intro);
        assert_eq!(c.narration(), Some("first"));
    }

    #[test]
    fn skipping_a_stage_is_rejected_without_side_effects() {
        let mut c = controller();
        let err = c.request_advance(Stage::Quiz, "skip").unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
        assert_eq!(c.stage(), &Stage::Intro);
        assert!(!c.has_pending());
        assert_eq!(c.narration(), None);
    }

    #[test]
    fn moving_backwards_is_rejected() {
        let mut c = controller();
        c.request_advance(Stage::Setup, "a").unwrap();
        c.on_narration_complete();
        let err = c.request_advance(Stage::Intro, "back").unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn reentry_is_allowed() {
        let mut c = controller();
        c.request_advance(Stage::Intro, "again").unwrap();
        let ack = c.on_narration_complete();
        assert_eq!(
            ack,
            NarrationAck::Committed {
                from: Stage::Intro,
                to: Stage::Intro
            }
        );
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let graph = StageGraph::new([Stage::Intro, Stage::Setup]).unwrap();
        let mut c = StageController::new(graph);
        let err = c.request_advance(Stage::Complete, "x").unwrap_err();
        assert!(matches!(err, TransitionError::UnknownStage(_)));
    }

    #[test]
    fn narration_after_reset_is_stale() {
        let mut c = controller();
        c.request_advance(Stage::Setup, "go").unwrap();
        c.reset();
        assert!(!c.has_pending());
        assert_eq!(c.narration(), None);
        assert_eq!(c.on_narration_complete(), NarrationAck::Stale);
        assert_eq!(c.stage(), &Stage::Intro);
    }

    #[test]
    fn reset_to_declared_stage_restarts_there() {
        let mut c = controller();
        c.request_advance(Stage::Setup, "go").unwrap();
        c.on_narration_complete();
        c.request_advance(Stage::Quiz, "quiz").unwrap();
        c.reset_to(Stage::Setup).unwrap();
        assert_eq!(c.stage(), &Stage::Setup);
        assert!(!c.has_pending());
    }

    #[test]
    fn reset_to_unknown_stage_leaves_session_alone() {
        let graph = StageGraph::new([Stage::Intro, Stage::Setup]).unwrap();
        let mut c = StageController::new(graph);
        c.request_advance(Stage::Setup, "go").unwrap();
        let err = c.reset_to(Stage::Quiz).unwrap_err();
        assert!(matches!(err, TransitionError::UnknownStage(_)));
        assert!(c.has_pending());
    }

    #[test]
    fn flavour_narration_does_not_override_pending_message() {
        let mut c = controller();
        assert!(c.narrate("all supplies collected"));
        assert_eq!(c.on_narration_complete(), NarrationAck::Stale);

        c.request_advance(Stage::Setup, "to setup").unwrap();
        assert!(!c.narrate("chatter"));
        assert_eq!(c.narration(), Some("to setup"));
    }

    #[test]
    fn walks_to_terminal_stage() {
        let mut c = controller();
        for next in [Stage::Setup, Stage::Quiz, Stage::Complete] {
            c.request_advance(next, "next").unwrap();
            assert!(c.on_narration_complete().is_committed());
        }
        assert!(c.is_at_terminal());
    }
}
