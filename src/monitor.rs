//! Active-dataset context owned by the serving layer.
//!
//! At most one dataset is monitored at a time. Switching datasets stops every
//! prober of the previous dataset before the replacement controller exists,
//! as one transition no request can observe half-done — an explicit context
//! object handed to request handlers, never an implicit global.

use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::probe::Controller;
use crate::storage::{self, Database, SampleStore, StorageError};

/// Errors surfaced by the monitoring context.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// No dataset has been activated yet.
    #[error("no dataset is active; choose one first")]
    NoActiveDataset,

    /// Storage-layer failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One monitored dataset: its store plus the controller owning its probers.
pub struct ActiveDataset {
    name: String,
    store: SampleStore,
    controller: Controller,
}

impl ActiveDataset {
    /// Dataset name (also the samples table name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dataset's sample store (the read path).
    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// The dataset's probe controller (the control path).
    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

/// Process-wide monitoring context.
pub struct Monitor {
    db: Database,
    active: RwLock<Option<ActiveDataset>>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor").finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a context with no active dataset.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            active: RwLock::new(None),
        }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Dataset tables present in the database.
    pub async fn datasets(&self) -> Result<Vec<String>, StorageError> {
        storage::list_datasets(&self.db).await
    }

    /// Name of the active dataset, if any.
    pub async fn active_dataset(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|a| a.name.clone())
    }

    /// Read access to the active dataset; handlers hold this guard for the
    /// duration of one operation, which keeps `switch` out until they finish.
    pub async fn active(&self) -> RwLockReadGuard<'_, Option<ActiveDataset>> {
        self.active.read().await
    }

    /// Make `name` the active dataset.
    ///
    /// Every prober of the previous dataset is stopped (joined) first; only
    /// then is the new store opened and its controller recovered from stored
    /// history.
    pub async fn switch(&self, name: &str) -> Result<(), MonitorError> {
        let mut active = self.active.write().await;
        if let Some(old) = active.take() {
            tracing::info!(dataset = %old.name, "Stopping probers of previous dataset");
            old.controller.stop_all().await;
        }

        let store = SampleStore::open(self.db.clone(), name).await?;
        let controller = Controller::recover(store.clone()).await?;
        *active = Some(ActiveDataset {
            name: name.to_string(),
            store,
            controller,
        });
        tracing::info!(dataset = %name, "Dataset activated");
        Ok(())
    }

    /// Stop all probers and deactivate the current dataset, if any.
    pub async fn shutdown(&self) {
        let mut active = self.active.write().await;
        if let Some(old) = active.take() {
            tracing::info!(dataset = %old.name, "Stopping probers for shutdown");
            old.controller.stop_all().await;
        }
    }
}
