use std::sync::Arc;

use learn_core::model::{CompletionRecord, LabId, ProgressLedger, Score, XpAward, XpPolicy};
use storage::repository::{InMemoryRepository, ProgressRepository, ProgressSnapshot};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Process-wide owner of the progress ledger.
///
/// Create one at startup and share it (`Arc`) with every lab session. Each
/// award runs as one critical section: the award is staged, written to the
/// repository, and only then applied in memory, so a failed write leaves no
/// trace and concurrent awards apply one after another in lock order.
///
/// The critical section runs on its own task. Dropping an `award_completion`
/// future does not stop an award that has started; it still lands in both
/// the repository and the ledger.
pub struct ProgressService {
    clock: Clock,
    ledger: Arc<Mutex<ProgressLedger>>,
    repo: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    /// Hydrate the ledger from the repository.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if loading fails, or
    /// `ProgressServiceError::Ledger` if the stored records are inconsistent.
    pub async fn load(
        clock: Clock,
        policy: XpPolicy,
        repo: Arc<dyn ProgressRepository>,
    ) -> Result<Self, ProgressServiceError> {
        let ProgressSnapshot { records, total_xp } = repo.load_progress().await?;
        let count = records.len();
        let ledger = ProgressLedger::from_persisted(policy, records, total_xp)?;
        info!(records = count, total_xp, "progress ledger hydrated");
        Ok(Self {
            clock,
            ledger: Arc::new(Mutex::new(ledger)),
            repo,
        })
    }

    /// Fresh ledger backed by an in-memory repository.
    #[must_use]
    pub fn in_memory(clock: Clock, policy: XpPolicy) -> Self {
        Self {
            clock,
            ledger: Arc::new(Mutex::new(ProgressLedger::new(policy))),
            repo: Arc::new(InMemoryRepository::new()),
        }
    }

    /// Record a completion of `lab_id` and return the XP it earned.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the award cannot be persisted;
    /// the ledger is unchanged in that case.
    pub async fn award_completion(
        &self,
        lab_id: &LabId,
        score: Score,
        time_spent_secs: u64,
    ) -> Result<XpAward, ProgressServiceError> {
        let ledger = Arc::clone(&self.ledger);
        let repo = Arc::clone(&self.repo);
        let clock = self.clock;
        let lab_id = lab_id.clone();

        tokio::spawn(apply_award(ledger, repo, clock, lab_id, score, time_spent_secs)).await?
    }

    pub async fn is_completed(&self, lab_id: &LabId) -> bool {
        self.ledger.lock().await.is_completed(lab_id)
    }

    pub async fn get_completion(&self, lab_id: &LabId) -> Option<CompletionRecord> {
        self.ledger.lock().await.get_completion(lab_id).cloned()
    }

    pub async fn total_xp(&self) -> u64 {
        self.ledger.lock().await.total_xp()
    }

    /// Copy of all records and the total, taken under one lock.
    pub async fn snapshot(&self) -> ProgressSnapshot {
        let ledger = self.ledger.lock().await;
        ProgressSnapshot {
            records: ledger.records().cloned().collect(),
            total_xp: ledger.total_xp(),
        }
    }

    /// Most recent awards from the persisted award log.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on repository failures.
    pub async fn recent_awards(
        &self,
        lab_id: Option<&LabId>,
        limit: u32,
    ) -> Result<Vec<XpAward>, ProgressServiceError> {
        Ok(self.repo.list_awards(lab_id, limit).await?)
    }
}

/// Stage, persist, then commit one award while holding the ledger lock.
async fn apply_award(
    ledger: Arc<Mutex<ProgressLedger>>,
    repo: Arc<dyn ProgressRepository>,
    clock: Clock,
    lab_id: LabId,
    score: Score,
    time_spent_secs: u64,
) -> Result<XpAward, ProgressServiceError> {
    let mut ledger = ledger.lock_owned().await;
    let staged = ledger.stage_award(&lab_id, score, time_spent_secs, clock.now());

    if let Err(err) = repo.commit_award(staged.record(), staged.award()).await {
        warn!(%lab_id, error = %err, "failed to persist xp award");
        return Err(err.into());
    }

    let award = ledger.commit(staged)?;
    info!(
        %lab_id,
        xp = award.xp,
        kind = award.kind.as_str(),
        score = %award.score,
        total_xp = award.total_xp_after,
        "xp awarded"
    );
    Ok(award)
}
