use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use learn_core::model::{CompletionRecord, LabId, Score, XpAward, XpPolicy};
use learn_core::time::fixed_now;
use services::{Clock, ProgressService, ProgressServiceError};
use storage::repository::{
    InMemoryRepository, ProgressRepository, ProgressSnapshot, StorageError,
};

/// Delegates to an in-memory repository, failing writes while `fail` is set.
struct FlakyRepository {
    inner: InMemoryRepository,
    fail: AtomicBool,
}

#[async_trait]
impl ProgressRepository for FlakyRepository {
    async fn load_progress(&self) -> Result<ProgressSnapshot, StorageError> {
        self.inner.load_progress().await
    }

    async fn commit_award(
        &self,
        record: &CompletionRecord,
        award: &XpAward,
    ) -> Result<(), StorageError> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("disk unplugged".into()));
        }
        self.inner.commit_award(record, award).await
    }

    async fn list_awards(
        &self,
        lab_id: Option<&LabId>,
        limit: u32,
    ) -> Result<Vec<XpAward>, StorageError> {
        self.inner.list_awards(lab_id, limit).await
    }
}

/// Commits immediately, then stalls before reporting success.
struct SlowAckRepository {
    inner: InMemoryRepository,
}

#[async_trait]
impl ProgressRepository for SlowAckRepository {
    async fn load_progress(&self) -> Result<ProgressSnapshot, StorageError> {
        self.inner.load_progress().await
    }

    async fn commit_award(
        &self,
        record: &CompletionRecord,
        award: &XpAward,
    ) -> Result<(), StorageError> {
        self.inner.commit_award(record, award).await?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }

    async fn list_awards(
        &self,
        lab_id: Option<&LabId>,
        limit: u32,
    ) -> Result<Vec<XpAward>, StorageError> {
        self.inner.list_awards(lab_id, limit).await
    }
}

#[tokio::test]
async fn abandoned_award_still_lands_in_ledger_and_store() {
    let repo = Arc::new(SlowAckRepository {
        inner: InMemoryRepository::new(),
    });
    let service = ProgressService::load(
        Clock::fixed(fixed_now()),
        XpPolicy::default(),
        Arc::clone(&repo) as Arc<dyn ProgressRepository>,
    )
    .await
    .expect("load");
    let lab = LabId::new("limewater-test-lab").expect("lab id");

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        service.award_completion(&lab, Score::MAX, 30),
    )
    .await;
    assert!(abandoned.is_err());

    let replay = service
        .award_completion(&lab, Score::MAX, 30)
        .await
        .expect("award after abandoned call");
    assert_eq!(replay.xp, 75);
    assert_eq!(replay.total_xp_after, 175);
    assert_eq!(service.total_xp().await, 175);
    assert_eq!(repo.inner.load_progress().await.expect("snapshot").total_xp, 175);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_awards_sum_correctly() {
    let service = Arc::new(ProgressService::in_memory(
        Clock::fixed(fixed_now()),
        XpPolicy::default(),
    ));

    let mut handles = Vec::new();
    for n in 0..8 {
        for _ in 0..2 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let lab = LabId::new(format!("lab-{n}")).expect("lab id");
                service
                    .award_completion(&lab, Score::MAX, 10)
                    .await
                    .expect("award")
            }));
        }
    }
    let mut awarded = 0_u64;
    for handle in handles {
        awarded += u64::from(handle.await.expect("join").xp);
    }

    // Eight labs, each completed once at full XP and replayed once.
    assert_eq!(awarded, 8 * (100 + 75));
    assert_eq!(service.total_xp().await, awarded);
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.records.len(), 8);
    assert!(snapshot.records.iter().all(|r| r.times_completed() == 2));
}

#[tokio::test]
async fn failed_persistence_leaves_ledger_unchanged() {
    let repo = Arc::new(FlakyRepository {
        inner: InMemoryRepository::new(),
        fail: AtomicBool::new(true),
    });
    let service = ProgressService::load(
        Clock::fixed(fixed_now()),
        XpPolicy::default(),
        Arc::clone(&repo) as Arc<dyn ProgressRepository>,
    )
    .await
    .expect("load");
    let lab = LabId::new("oxygen-test-lab").expect("lab id");

    let err = service
        .award_completion(&lab, Score::MAX, 30)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressServiceError::Storage(_)));
    assert_eq!(service.total_xp().await, 0);
    assert!(!service.is_completed(&lab).await);

    repo.fail.store(false, Ordering::SeqCst);
    let award = service
        .award_completion(&lab, Score::MAX, 30)
        .await
        .expect("award");
    assert_eq!(award.xp, 100);
    assert_eq!(award.total_xp_after, 100);
}
