use std::path::Path;

use anyhow::Context;
use learn_core::model::XpPolicyDraft;
use serde::Deserialize;
use services::LabDefinitionDraft;

/// Optional settings file.
///
/// ```toml
/// narration_timeout_ms = 1500
///
/// [xp]
/// replay_percent = 50
///
/// [[labs]]
/// lab_id = "flame-test-lab"
/// title = "Flame Test"
/// stages = ["intro", "quiz", "complete"]
/// quiz_stage = "quiz"
/// correct_answers = ["lilac"]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub xp: XpPolicyDraft,
    pub labs: Vec<LabDefinitionDraft>,
    pub narration_timeout_ms: Option<u64>,
}

impl AppConfig {
    /// Read `path`, or return defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid TOML for this shape.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.xp, XpPolicyDraft::default());
        assert!(config.labs.is_empty());
        assert_eq!(config.narration_timeout_ms, None);
    }

    #[test]
    fn partial_xp_section_keeps_other_defaults() {
        let config = AppConfig::parse(
            r#"
                narration_timeout_ms = 1500

                [xp]
                replay_percent = 50

                [[labs]]
                lab_id = "flame-test-lab"
                title = "Flame Test"
                stages = ["intro", "quiz", "complete"]
                quiz_stage = "quiz"
                correct_answers = ["lilac"]
            "#,
        )
        .unwrap();
        assert_eq!(config.xp.replay_percent, 50);
        assert_eq!(config.xp.perfect_xp, XpPolicyDraft::default().perfect_xp);
        assert_eq!(config.narration_timeout_ms, Some(1500));
        assert_eq!(config.labs.len(), 1);
        assert!(config.labs[0].intro_narration.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AppConfig::parse("narration_timeout = 5").is_err());
    }
}
