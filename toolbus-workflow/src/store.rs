//! Process-local workflow state store.

use std::collections::HashMap;

use tokio::sync::RwLock;
use toolbus_primitives::WorkflowId;

use crate::state::WorkflowState;

/// In-memory store for in-progress workflows.
///
/// Explicitly process-local and non-durable: state lives only for the host
/// process's lifetime. The narrow get/put/remove surface keeps the engine
/// independent of the storage, so a durable store can replace this one
/// without touching the workflow logic.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    inner: RwLock<HashMap<WorkflowId, WorkflowState>>,
}

impl WorkflowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the state for its workflow id.
    pub async fn put(&self, state: WorkflowState) {
        self.inner.write().await.insert(state.id(), state);
    }

    /// Returns a snapshot of the state for the supplied id.
    pub async fn get(&self, id: WorkflowId) -> Option<WorkflowState> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Removes and returns the state for the supplied id.
    pub async fn remove(&self, id: WorkflowId) -> Option<WorkflowState> {
        self.inner.write().await.remove(&id)
    }
}
