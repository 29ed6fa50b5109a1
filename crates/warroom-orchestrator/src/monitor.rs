use crate::types::{BranchMetrics, BranchState, BranchStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use warroom_core::BranchId;

/// Tracks state and metrics for every branch of one merge.
///
/// Attach it with [`MergeEngine::with_monitor`](crate::MergeEngine::with_monitor);
/// the engine and the branch emitters update it as the merge progresses.
pub struct BranchMonitor {
    states: Arc<RwLock<HashMap<usize, BranchState>>>,
}

impl BranchMonitor {
    /// An empty monitor.
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a branch in `Pending` state.
    pub async fn register(&self, branch: &BranchId) {
        let mut states = self.states.write().await;
        states.insert(branch.index, BranchState::pending(branch.clone()));
    }

    /// Mark a branch as running.
    pub async fn start(&self, index: usize) {
        self.set_status(index, BranchStatus::Running).await;
    }

    /// Record that a branch handed an event over and now waits for the consumer.
    pub async fn event_emitted(&self, index: usize) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&index) {
            state.metrics.events_emitted += 1;
            state.status = BranchStatus::AwaitingAck;
        }
    }

    /// Record that the consumer resumed a branch after `wait_ms`.
    pub async fn acknowledged(&self, index: usize, wait_ms: u64) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&index) {
            state.metrics.ack_wait_ms += wait_ms;
            state.status = BranchStatus::Running;
        }
    }

    /// Mark a branch as finished normally.
    pub async fn finish(&self, index: usize, duration_ms: u64) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&index) {
            state.metrics.duration_ms = duration_ms;
            state.status = BranchStatus::Finished;
        }
    }

    /// Mark a branch as failed.
    pub async fn fail(&self, index: usize, error: impl Into<String>, duration_ms: u64) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&index) {
            state.metrics.duration_ms = duration_ms;
            state.status = BranchStatus::Failed;
            state.last_error = Some(error.into());
        }
    }

    /// Mark every branch not yet in a final state as cancelled.
    /// Returns how many branches were affected.
    pub async fn cancel_unfinished(&self) -> usize {
        let mut states = self.states.write().await;
        let mut cancelled = 0;
        for state in states.values_mut() {
            if !state.status.is_final() {
                state.status = BranchStatus::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    async fn set_status(&self, index: usize, status: BranchStatus) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&index) {
            state.status = status;
        }
    }

    /// Snapshot of all branch states, ordered by branch index.
    pub async fn snapshot(&self) -> Vec<BranchState> {
        let states = self.states.read().await;
        let mut all: Vec<BranchState> = states.values().cloned().collect();
        all.sort_by_key(|s| s.branch.index);
        all
    }

    /// State of one branch.
    pub async fn get_state(&self, index: usize) -> Option<BranchState> {
        let states = self.states.read().await;
        states.get(&index).cloned()
    }

    /// Aggregate metrics across all branches (durations are summed).
    pub async fn aggregate_metrics(&self) -> BranchMetrics {
        let states = self.states.read().await;
        let mut total = BranchMetrics::default();
        for state in states.values() {
            total.events_emitted += state.metrics.events_emitted;
            total.ack_wait_ms += state.metrics.ack_wait_ms;
            total.duration_ms += state.metrics.duration_ms;
        }
        total
    }

    /// Serialize the current state as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let states = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "branches": states,
            "aggregate": aggregate,
        })
    }
}

impl Default for BranchMonitor {
    fn default() -> Self {
        Self::new()
    }
}
