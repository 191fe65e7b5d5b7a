//! Background recording of mapping usage outcomes.

use crate::domain::{MappingId, MappingStore};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

#[derive(Debug)]
struct UsageEvent {
    mapping_id: MappingId,
    success: bool,
}

/// Bounded queue plus a single worker applying usage updates to the store.
///
/// Enqueueing never waits. When the queue is full the event is dropped and
/// logged, so the read path is never slowed by a degraded store.
pub struct UsageStatsRecorder {
    sender: RwLock<Option<mpsc::Sender<UsageEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UsageStatsRecorder {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn MappingStore>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(store, receiver));
        Self {
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues one usage outcome. Returns false if it was dropped.
    pub fn record(&self, mapping_id: &MappingId, success: bool) -> bool {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return false;
        };
        let event = UsageEvent {
            mapping_id: mapping_id.clone(),
            success,
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                log::warn!(
                    "Usage stats queue full, dropping update for mapping {}",
                    event.mapping_id
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Closes the queue and waits until every queued event has been applied.
    pub async fn shutdown(&self) {
        self.sender.write().take();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(err) = worker.await
        {
            log::error!("Usage stats worker failed: {}", err);
        }
    }
}

async fn run_worker(store: Arc<dyn MappingStore>, mut receiver: mpsc::Receiver<UsageEvent>) {
    while let Some(event) = receiver.recv().await {
        if let Err(err) = store
            .update_usage_stats(&event.mapping_id, event.success)
            .await
        {
            log::warn!(
                "Failed to update usage stats for mapping {}: {}",
                event.mapping_id,
                err
            );
        }
    }
    log::debug!("Usage stats worker drained");
}
