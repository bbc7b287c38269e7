//! Probe lifecycle management and the target registry.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::probe::{Prober, Target};
use crate::storage::{SampleStore, StorageError};

/// Live sampling task for one target, with its cancellation signal.
///
/// Exists only while a prober is running; a `None` registry slot means the
/// target is known but idle.
struct ProbeHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProbeHandle {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Registry of known targets and their prober lifecycle state.
///
/// Guarantees at most one live prober per target. All registry mutation goes
/// through a single async guard, and `stop` holds that guard across the
/// worker's join, so no new writer for the target can slip in while the old
/// one drains its final attempt. Prober network I/O itself runs outside the
/// guard.
pub struct Controller {
    store: SampleStore,
    registry: Mutex<HashMap<String, Option<ProbeHandle>>>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("dataset", &self.store.dataset())
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Build a controller whose registry is seeded from stored history,
    /// every recovered target idle.
    pub async fn recover(store: SampleStore) -> Result<Self, StorageError> {
        let known = store.distinct_targets().await?;
        tracing::info!(
            dataset = %store.dataset(),
            targets = known.len(),
            "Registry recovered from stored history"
        );

        let registry = known.into_iter().map(|h| (h, None)).collect();
        Ok(Self {
            store,
            registry: Mutex::new(registry),
        })
    }

    /// The store this controller's probers write through.
    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Snapshot of the targets currently known to the registry, sorted.
    pub async fn targets(&self) -> Vec<String> {
        let registry = self.registry.lock().await;
        let mut targets: Vec<String> = registry.keys().cloned().collect();
        targets.sort();
        targets
    }

    /// Record a target as known without starting it. No-op on empty names.
    pub async fn ensure_known(&self, hostname: &str) {
        if hostname.is_empty() {
            return;
        }
        self.registry
            .lock()
            .await
            .entry(hostname.to_string())
            .or_insert(None);
    }

    /// Whether the target currently has a live prober.
    pub async fn is_running(&self, hostname: &str) -> bool {
        let registry = self.registry.lock().await;
        matches!(registry.get(hostname), Some(Some(handle)) if handle.is_live())
    }

    /// Spawn a prober for the target.
    ///
    /// No-op on an empty hostname or when a live prober already exists. A
    /// handle whose task has died on its own counts as absent, so the entry
    /// normalizes here on the next start.
    pub async fn start(&self, hostname: &str) {
        if hostname.is_empty() {
            return;
        }

        let mut registry = self.registry.lock().await;
        let entry = registry.entry(hostname.to_string()).or_insert(None);
        if let Some(handle) = entry
            && handle.is_live()
        {
            return;
        }

        let cancel = CancellationToken::new();
        let prober = Prober::new(Target::parse(hostname), self.store.clone());
        let task = tokio::spawn(prober.run(cancel.clone()));
        *entry = Some(ProbeHandle { cancel, task });
        tracing::info!(target = %hostname, "Prober started");
    }

    /// Cancel the target's prober and wait for it to terminate.
    ///
    /// When this returns, no further sample for the target will be written.
    /// No-op if the target is unknown or idle.
    pub async fn stop(&self, hostname: &str) {
        let mut registry = self.registry.lock().await;
        Self::stop_locked(&mut registry, hostname).await;
    }

    async fn stop_locked(registry: &mut HashMap<String, Option<ProbeHandle>>, hostname: &str) {
        let Some(entry) = registry.get_mut(hostname) else {
            return;
        };
        let Some(handle) = entry.take() else {
            return;
        };

        handle.cancel.cancel();
        match handle.task.await {
            Ok(()) => tracing::info!(target = %hostname, "Prober stopped"),
            // A worker that died on its own is already stopped; surface it.
            Err(e) => tracing::warn!(target = %hostname, error = %e, "Prober ended abnormally"),
        }
    }

    /// Stop the target, drop it from the registry, and purge its stored
    /// samples.
    ///
    /// The stop join completes before the purge, so deleted history cannot be
    /// resurrected by a final in-flight write.
    pub async fn delete(&self, hostname: &str) -> Result<(), StorageError> {
        let mut registry = self.registry.lock().await;
        Self::stop_locked(&mut registry, hostname).await;
        registry.remove(hostname);

        let purged = self.store.delete_target(hostname).await?;
        tracing::info!(target = %hostname, purged, "Target deleted");
        Ok(())
    }

    /// Start every known target, iterating over a snapshot of the registry.
    pub async fn start_all(&self) {
        for hostname in self.targets().await {
            self.start(&hostname).await;
        }
    }

    /// Stop every known target, iterating over a snapshot of the registry.
    pub async fn stop_all(&self) {
        for hostname in self.targets().await {
            self.stop(&hostname).await;
        }
    }
}
