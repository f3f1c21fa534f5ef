use std::sync::Arc;

use learn_core::model::XpPolicy;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::labs::{LabDefinition, LabRunner};
use crate::progress_service::ProgressService;

/// Assembles app-facing services around one shared progress ledger.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or ledger hydration fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        policy: XpPolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, policy).await
    }

    /// Build services on top of an already opened `Storage`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Progress` if the stored progress cannot be loaded.
    pub async fn from_storage(
        storage: Storage,
        clock: Clock,
        policy: XpPolicy,
    ) -> Result<Self, AppServicesError> {
        let progress =
            Arc::new(ProgressService::load(clock, policy, Arc::clone(&storage.progress)).await?);
        Ok(Self { clock, progress })
    }

    /// Services with nothing persisted.
    #[must_use]
    pub fn in_memory(clock: Clock, policy: XpPolicy) -> Self {
        Self {
            clock,
            progress: Arc::new(ProgressService::in_memory(clock, policy)),
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// Open a new run of `definition` against the shared ledger.
    pub async fn start_lab(&self, definition: Arc<LabDefinition>) -> LabRunner {
        LabRunner::start(definition, self.progress(), self.clock).await
    }
}
