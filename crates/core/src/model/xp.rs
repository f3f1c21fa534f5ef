use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("score must be between 0 and 100, got {0}")]
    OutOfRange(u32),
}

/// Quiz score on a 0..=100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Score(u8);

impl Score {
    pub const MAX: Score = Score(100);

    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` for values above 100.
    pub fn new(value: u32) -> Result<Self, ScoreError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ScoreError::OutOfRange(value))
    }

    /// Score for a quiz passed on the given attempt: 100 on the first try,
    /// 80 on the second, 60 after that.
    #[must_use]
    pub fn from_attempts(attempts: u32) -> Self {
        match attempts {
            0 | 1 => Self(100),
            2 => Self(80),
            _ => Self(60),
        }
    }

    #[must_use]
    pub fn value(self) -> u32 {
        u32::from(self.0)
    }
}

impl TryFrom<u32> for Score {
    type Error = ScoreError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u32 {
    fn from(score: Score) -> Self {
        score.value()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── XP POLICY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum XpPolicyError {
    #[error("first-time awards must be greater than zero")]
    ZeroAward,

    #[error("first-time awards must not decrease as the score rises")]
    NotMonotonic,

    #[error("score thresholds must satisfy 0 < good <= perfect <= 100")]
    InvalidThresholds,

    #[error("replay percent must be below 100, got {0}")]
    ReplayTooLarge(u32),
}

/// Editable XP settings, e.g. deserialized from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpPolicyDraft {
    pub perfect_threshold: u32,
    pub good_threshold: u32,
    pub perfect_xp: u32,
    pub good_xp: u32,
    pub base_xp: u32,
    pub replay_percent: u32,
}

impl Default for XpPolicyDraft {
    fn default() -> Self {
        Self {
            perfect_threshold: 100,
            good_threshold: 80,
            perfect_xp: 100,
            good_xp: 80,
            base_xp: 60,
            replay_percent: 75,
        }
    }
}

impl XpPolicyDraft {
    /// Validate the draft into a usable policy.
    ///
    /// # Errors
    ///
    /// Returns `XpPolicyError` when an award is zero, awards shrink as the score
    /// rises, thresholds are out of order, or replays would pay the full bonus.
    pub fn validate(self) -> Result<XpPolicy, XpPolicyError> {
        if self.base_xp == 0 || self.good_xp == 0 || self.perfect_xp == 0 {
            return Err(XpPolicyError::ZeroAward);
        }
        if self.base_xp > self.good_xp || self.good_xp > self.perfect_xp {
            return Err(XpPolicyError::NotMonotonic);
        }
        if self.good_threshold == 0
            || self.good_threshold > self.perfect_threshold
            || self.perfect_threshold > 100
        {
            return Err(XpPolicyError::InvalidThresholds);
        }
        if self.replay_percent >= 100 {
            return Err(XpPolicyError::ReplayTooLarge(self.replay_percent));
        }
        Ok(XpPolicy { draft: self })
    }
}

/// How much XP a completion is worth.
///
/// First completions pay a tier chosen by score. Replays pay a floored
/// percentage of that tier, which is always strictly less than the tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XpPolicy {
    draft: XpPolicyDraft,
}

impl XpPolicy {
    #[must_use]
    pub fn first_time_xp(&self, score: Score) -> u32 {
        let d = &self.draft;
        let score = score.value();
        if score >= d.perfect_threshold {
            d.perfect_xp
        } else if score >= d.good_threshold {
            d.good_xp
        } else {
            d.base_xp
        }
    }

    #[must_use]
    pub fn replay_xp(&self, score: Score) -> u32 {
        let first = u64::from(self.first_time_xp(score));
        let replay = first * u64::from(self.draft.replay_percent) / 100;
        u32::try_from(replay).unwrap_or(u32::MAX)
    }
}
