use async_trait::async_trait;
use learn_core::model::{CompletionRecord, LabId, XpAward};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Everything needed to rebuild the progress ledger at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub records: Vec<CompletionRecord>,
    pub total_xp: u64,
}

/// Persistence contract for completion records and XP.
///
/// Implementations must apply `commit_award` atomically: the record upsert,
/// the award log row and the new total land together or not at all.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Load all completion records and the current XP total.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored state cannot be read or decoded.
    async fn load_progress(&self) -> Result<ProgressSnapshot, StorageError>;

    /// Persist one award together with the record it produced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored total is not the one the
    /// award was computed from, or other storage errors.
    async fn commit_award(
        &self,
        record: &CompletionRecord,
        award: &XpAward,
    ) -> Result<(), StorageError>;

    /// Most recent awards first, optionally for a single lab.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn list_awards(
        &self,
        lab_id: Option<&LabId>,
        limit: u32,
    ) -> Result<Vec<XpAward>, StorageError>;
}

#[derive(Debug, Default)]
struct InMemoryProgress {
    records: BTreeMap<LabId, CompletionRecord>,
    awards: Vec<XpAward>,
    total_xp: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<InMemoryProgress>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(&self) -> Result<ProgressSnapshot, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(ProgressSnapshot {
            records: guard.records.values().cloned().collect(),
            total_xp: guard.total_xp,
        })
    }

    async fn commit_award(
        &self,
        record: &CompletionRecord,
        award: &XpAward,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let expected = award.total_xp_after.saturating_sub(u64::from(award.xp));
        if guard.total_xp != expected {
            return Err(StorageError::Conflict(format!(
                "stored total {} does not match {expected}",
                guard.total_xp
            )));
        }
        guard.records.insert(record.lab_id().clone(), record.clone());
        guard.awards.push(award.clone());
        guard.total_xp = award.total_xp_after;
        Ok(())
    }

    async fn list_awards(
        &self,
        lab_id: Option<&LabId>,
        limit: u32,
    ) -> Result<Vec<XpAward>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .awards
            .iter()
            .rev()
            .filter(|a| lab_id.is_none_or(|id| &a.lab_id == id))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{ProgressLedger, Score};
    use learn_core::time::fixed_now;

    fn lab(id: &str) -> LabId {
        LabId::new(id).unwrap()
    }

    #[tokio::test]
    async fn commits_and_reloads_progress() {
        let repo = InMemoryRepository::new();
        let mut ledger = ProgressLedger::default();

        for id in ["a", "b", "a"] {
            let staged = ledger.stage_award(&lab(id), Score::MAX, 10, fixed_now());
            repo.commit_award(staged.record(), staged.award())
                .await
                .unwrap();
            ledger.commit(staged).unwrap();
        }

        let snapshot = repo.load_progress().await.unwrap();
        assert_eq!(snapshot.total_xp, 275);
        assert_eq!(snapshot.records.len(), 2);

        let awards = repo.list_awards(Some(&lab("a")), 10).await.unwrap();
        assert_eq!(awards.len(), 2);
        assert_eq!(awards[0].xp, 75);
        assert_eq!(awards[1].xp, 100);
    }

    #[tokio::test]
    async fn rejects_award_computed_from_another_total() {
        let repo = InMemoryRepository::new();
        let mut ledger = ProgressLedger::default();
        ledger.award_completion(&lab("a"), Score::MAX, 1, fixed_now());

        let staged = ledger.stage_award(&lab("b"), Score::MAX, 1, fixed_now());
        let err = repo
            .commit_award(staged.record(), staged.award())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(repo.load_progress().await.unwrap(), ProgressSnapshot::default());
    }
}
