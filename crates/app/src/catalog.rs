use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use learn_core::model::LabId;
use services::{LabDefinition, LabDefinitionDraft};

fn draft(
    lab_id: &str,
    title: &str,
    stages: &[&str],
    answers: &[&str],
    intro: &str,
) -> LabDefinitionDraft {
    LabDefinitionDraft {
        lab_id: lab_id.to_owned(),
        title: title.to_owned(),
        stages: stages.iter().map(|s| (*s).to_owned()).collect(),
        quiz_stage: "quiz".to_owned(),
        correct_answers: answers.iter().map(|s| (*s).to_owned()).collect(),
        intro_narration: intro.to_owned(),
    }
}

fn builtin_drafts() -> Vec<LabDefinitionDraft> {
    vec![
        draft(
            "oxygen-test-lab",
            "Test for Oxygen Gas",
            &[
                "intro",
                "collect-supplies",
                "setup",
                "select-tube",
                "inserting",
                "result",
                "quiz",
                "complete",
            ],
            &["relight", "supports", "air"],
            "Welcome to the Oxygen Test Lab! Today we'll use a glowing splint to test for oxygen gas.",
        ),
        draft(
            "limewater-test-lab",
            "Limewater Test for Carbon Dioxide",
            &[
                "intro",
                "collect-supplies",
                "setup",
                "exhale",
                "observe",
                "result",
                "quiz",
                "complete",
            ],
            &["milky", "caco3", "caoh2"],
            "Welcome to the Limewater Test Lab! Let's find out what happens when carbon dioxide meets limewater.",
        ),
        draft(
            "ammonia-test-lab",
            "Test for Ammonia Gas",
            &["intro", "setup", "heating", "gas-produced", "testing", "result", "quiz", "complete"],
            &["base", "blue", "nh3"],
            "Welcome to the Ammonia Test Lab! Today we'll test for ammonia gas by heating an ammonium compound.",
        ),
    ]
}

/// Labs available to `labctl`, keyed by id.
#[derive(Debug, Default)]
pub struct Catalog {
    labs: BTreeMap<LabId, Arc<LabDefinition>>,
}

impl Catalog {
    /// Built-in labs plus `extra`; an extra lab replaces a built-in with the same id.
    ///
    /// # Errors
    ///
    /// Fails on the first draft that does not validate.
    pub fn load(extra: Vec<LabDefinitionDraft>) -> anyhow::Result<Self> {
        let mut labs = BTreeMap::new();
        for draft in builtin_drafts().into_iter().chain(extra) {
            let id = draft.lab_id.clone();
            let definition = draft
                .validate()
                .with_context(|| format!("invalid lab definition {id}"))?;
            labs.insert(definition.lab_id().clone(), Arc::new(definition));
        }
        Ok(Self { labs })
    }

    pub fn get(&self, lab_id: &LabId) -> Option<Arc<LabDefinition>> {
        self.labs.get(lab_id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabDefinition> {
        self.labs.values().map(AsRef::as_ref)
    }
}
