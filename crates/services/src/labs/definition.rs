use serde::{Deserialize, Serialize};

use learn_core::model::{AnswerKey, LabId, StageGraph, StageName};

use crate::error::LabDefinitionError;

/// Unvalidated lab description, as written in code or a config file.
///
/// `correct_answers[i]` is the correct choice for question `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabDefinitionDraft {
    pub lab_id: String,
    pub title: String,
    pub stages: Vec<String>,
    pub quiz_stage: String,
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub intro_narration: String,
}

impl LabDefinitionDraft {
    /// Validate the draft.
    ///
    /// # Errors
    ///
    /// Returns `LabDefinitionError` if the id, title, stage list or answer key
    /// is invalid, or if the quiz stage is not one of the declared stages.
    pub fn validate(self) -> Result<LabDefinition, LabDefinitionError> {
        let lab_id = LabId::new(self.lab_id).map_err(learn_core::Error::from)?;
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(LabDefinitionError::EmptyTitle);
        }
        let stages = StageGraph::from_names(self.stages).map_err(learn_core::Error::from)?;
        let quiz_stage = StageName::new(self.quiz_stage).map_err(learn_core::Error::from)?;
        if !stages.contains(&quiz_stage) {
            return Err(LabDefinitionError::UnknownQuizStage(quiz_stage.to_string()));
        }
        let answer_key = AnswerKey::new(self.correct_answers.into_iter().enumerate())
            .map_err(learn_core::Error::from)?;

        Ok(LabDefinition {
            lab_id,
            title,
            stages,
            quiz_stage,
            answer_key,
            intro_narration: self.intro_narration.trim().to_owned(),
        })
    }
}

/// A validated lab: its stage path, the stage that hosts the quiz, and the
/// quiz's answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabDefinition {
    lab_id: LabId,
    title: String,
    stages: StageGraph<StageName>,
    quiz_stage: StageName,
    answer_key: AnswerKey,
    intro_narration: String,
}

impl LabDefinition {
    #[must_use]
    pub fn lab_id(&self) -> &LabId {
        &self.lab_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn stages(&self) -> &StageGraph<StageName> {
        &self.stages
    }

    #[must_use]
    pub fn quiz_stage(&self) -> &StageName {
        &self.quiz_stage
    }

    #[must_use]
    pub fn answer_key(&self) -> &AnswerKey {
        &self.answer_key
    }

    /// Welcome message narrated when a run starts; may be empty.
    #[must_use]
    pub fn intro_narration(&self) -> &str {
        &self.intro_narration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> LabDefinitionDraft {
        LabDefinitionDraft {
            lab_id: "oxygen-test-lab".into(),
            title: "Oxygen Test".into(),
            stages: vec!["intro".into(), "setup".into(), "quiz".into(), "complete".into()],
            quiz_stage: "quiz".into(),
            correct_answers: vec!["relight".into(), "supports".into(), "air".into()],
            intro_narration: " Welcome to the Oxygen Test Lab! ".into(),
        }
    }

    #[test]
    fn valid_draft_builds_definition() {
        let def = draft().validate().unwrap();
        assert_eq!(def.lab_id().as_str(), "oxygen-test-lab");
        assert_eq!(def.stages().len(), 4);
        assert_eq!(def.answer_key().len(), 3);
        assert_eq!(def.answer_key().choice(2), Some("air"));
        assert_eq!(def.intro_narration(), "Welcome to the Oxygen Test Lab!");
    }

    #[test]
    fn quiz_stage_must_be_declared() {
        let mut d = draft();
        d.quiz_stage = "exam".into();
        assert!(matches!(
            d.validate().unwrap_err(),
            LabDefinitionError::UnknownQuizStage(_)
        ));
    }

    #[test]
    fn empty_answers_are_rejected() {
        let mut d = draft();
        d.correct_answers.clear();
        assert!(matches!(
            d.validate().unwrap_err(),
            LabDefinitionError::Invalid(learn_core::Error::Quiz(_))
        ));
    }

    #[test]
    fn blank_title_and_bad_id_are_rejected() {
        let mut d = draft();
        d.title = "  ".into();
        assert!(matches!(d.validate().unwrap_err(), LabDefinitionError::EmptyTitle));

        let mut d = draft();
        d.lab_id = "oxygen test".into();
        assert!(matches!(
            d.validate().unwrap_err(),
            LabDefinitionError::Invalid(learn_core::Error::LabId(_))
        ));
    }

    #[test]
    fn duplicate_stages_are_rejected() {
        let mut d = draft();
        d.stages.push("setup".into());
        assert!(matches!(
            d.validate().unwrap_err(),
            LabDefinitionError::Invalid(learn_core::Error::StageGraph(_))
        ));
    }
}
