use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::ids::LabId;
use crate::model::xp::{Score, XpPolicy};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("lab {0} has more than one completion record")]
    DuplicateRecord(LabId),

    #[error("total xp ({total}) is below the first-time awards on record ({records})")]
    TotalBelowRecords { total: u64, records: u64 },

    #[error("completion record for {0} must count at least one completion")]
    NoCompletions(LabId),

    #[error("staged award is stale: ledger total moved from {expected} to {actual}")]
    StaleStage { expected: u64, actual: u64 },
}

//
// ─── COMPLETION RECORD ─────────────────────────────────────────────────────────
//

/// Durable summary of a learner's latest result for one lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRecord {
    lab_id: LabId,
    score: Score,
    xp_earned: u32,
    time_spent_secs: u64,
    completed_at: DateTime<Utc>,
    times_completed: u32,
}

impl CompletionRecord {
    /// Rehydrate a record from storage.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NoCompletions` if `times_completed` is zero.
    pub fn from_persisted(
        lab_id: LabId,
        score: Score,
        xp_earned: u32,
        time_spent_secs: u64,
        completed_at: DateTime<Utc>,
        times_completed: u32,
    ) -> Result<Self, LedgerError> {
        if times_completed == 0 {
            return Err(LedgerError::NoCompletions(lab_id));
        }
        Ok(Self {
            lab_id,
            score,
            xp_earned,
            time_spent_secs,
            completed_at,
            times_completed,
        })
    }

    #[must_use]
    pub fn lab_id(&self) -> &LabId {
        &self.lab_id
    }

    /// Score of the most recent completion.
    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    /// XP granted by the first completion. Replays do not change it.
    #[must_use]
    pub fn xp_earned(&self) -> u32 {
        self.xp_earned
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn times_completed(&self) -> u32 {
        self.times_completed
    }
}

//
// ─── AWARDS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardKind {
    FirstCompletion,
    Replay,
}

impl AwardKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AwardKind::FirstCompletion => "first_completion",
            AwardKind::Replay => "replay",
        }
    }
}

/// One XP grant, as returned to the caller and appended to the award log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAward {
    pub lab_id: LabId,
    pub xp: u32,
    pub kind: AwardKind,
    pub score: Score,
    pub total_xp_after: u64,
    pub awarded_at: DateTime<Utc>,
}

/// An award computed against a ledger but not yet applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAward {
    award: XpAward,
    record: CompletionRecord,
    total_before: u64,
}

impl StagedAward {
    #[must_use]
    pub fn award(&self) -> &XpAward {
        &self.award
    }

    /// The record as it will read once the award is committed.
    #[must_use]
    pub fn record(&self) -> &CompletionRecord {
        &self.record
    }
}

//
// ─── LEDGER ────────────────────────────────────────────────────────────────────
//

/// Completion records and the running XP total.
///
/// Every change goes through an award: a first completion pays the policy's
/// first-time XP and creates the record, later completions pay the reduced
/// replay XP and refresh it. `total_xp` only ever grows by returned awards.
#[derive(Debug, Clone, Default)]
pub struct ProgressLedger {
    policy: XpPolicy,
    records: BTreeMap<LabId, CompletionRecord>,
    total_xp: u64,
}

impl ProgressLedger {
    #[must_use]
    pub fn new(policy: XpPolicy) -> Self {
        Self {
            policy,
            records: BTreeMap::new(),
            total_xp: 0,
        }
    }

    /// Rebuild a ledger from persisted records and total.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateRecord` if a lab appears twice, or
    /// `LedgerError::TotalBelowRecords` if the total cannot cover the
    /// first-time awards already on record.
    pub fn from_persisted(
        policy: XpPolicy,
        records: Vec<CompletionRecord>,
        total_xp: u64,
    ) -> Result<Self, LedgerError> {
        let mut by_lab = BTreeMap::new();
        let mut first_time_sum = 0_u64;
        for record in records {
            first_time_sum = first_time_sum.saturating_add(u64::from(record.xp_earned));
            let lab_id = record.lab_id.clone();
            if by_lab.insert(lab_id.clone(), record).is_some() {
                return Err(LedgerError::DuplicateRecord(lab_id));
            }
        }
        if total_xp < first_time_sum {
            return Err(LedgerError::TotalBelowRecords {
                total: total_xp,
                records: first_time_sum,
            });
        }
        Ok(Self {
            policy,
            records: by_lab,
            total_xp,
        })
    }

    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.total_xp
    }

    #[must_use]
    pub fn is_completed(&self, lab_id: &LabId) -> bool {
        self.records.contains_key(lab_id)
    }

    #[must_use]
    pub fn get_completion(&self, lab_id: &LabId) -> Option<&CompletionRecord> {
        self.records.get(lab_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &CompletionRecord> {
        self.records.values()
    }

    /// Compute what `award_completion` would do without touching the ledger.
    #[must_use]
    pub fn stage_award(
        &self,
        lab_id: &LabId,
        score: Score,
        time_spent_secs: u64,
        completed_at: DateTime<Utc>,
    ) -> StagedAward {
        let (xp, kind, record) = match self.records.get(lab_id) {
            None => {
                let xp = self.policy.first_time_xp(score);
                let record = CompletionRecord {
                    lab_id: lab_id.clone(),
                    score,
                    xp_earned: xp,
                    time_spent_secs,
                    completed_at,
                    times_completed: 1,
                };
                (xp, AwardKind::FirstCompletion, record)
            }
            Some(existing) => {
                let xp = self.policy.replay_xp(score);
                let record = CompletionRecord {
                    score,
                    time_spent_secs,
                    completed_at,
                    times_completed: existing.times_completed.saturating_add(1),
                    ..existing.clone()
                };
                (xp, AwardKind::Replay, record)
            }
        };

        StagedAward {
            award: XpAward {
                lab_id: lab_id.clone(),
                xp,
                kind,
                score,
                total_xp_after: self.total_xp.saturating_add(u64::from(xp)),
                awarded_at: completed_at,
            },
            record,
            total_before: self.total_xp,
        }
    }

    /// Apply a staged award.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StaleStage` if the ledger changed since the award
    /// was staged; nothing is applied in that case.
    pub fn commit(&mut self, staged: StagedAward) -> Result<XpAward, LedgerError> {
        let stale_record = match self.records.get(&staged.award.lab_id) {
            None => staged.award.kind != AwardKind::FirstCompletion,
            Some(current) => {
                staged.award.kind != AwardKind::Replay
                    || current.times_completed.saturating_add(1) != staged.record.times_completed
            }
        };
        if staged.total_before != self.total_xp || stale_record {
            return Err(LedgerError::StaleStage {
                expected: staged.total_before,
                actual: self.total_xp,
            });
        }
        Ok(self.apply(staged))
    }

    /// Record a completion and return the XP it earned.
    pub fn award_completion(
        &mut self,
        lab_id: &LabId,
        score: Score,
        time_spent_secs: u64,
        completed_at: DateTime<Utc>,
    ) -> XpAward {
        let staged = self.stage_award(lab_id, score, time_spent_secs, completed_at);
        self.apply(staged)
    }

    fn apply(&mut self, staged: StagedAward) -> XpAward {
        let StagedAward { award, record, .. } = staged;
        self.total_xp = award.total_xp_after;
        self.records.insert(record.lab_id.clone(), record);
        award
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
