use serde::{Deserialize, Serialize};
use warroom_core::BranchId;

/// Lifecycle of a branch inside one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    /// Registered, task not spawned yet.
    Pending,
    /// Producing its next event.
    Running,
    /// Handed an event over and is blocked until the consumer resumes it.
    AwaitingAck,
    /// Its sequence ended normally.
    Finished,
    /// Its work returned an error or panicked.
    Failed,
    /// Stopped by merge cancellation before finishing.
    Cancelled,
}

impl BranchStatus {
    /// Whether the branch has reached a final state.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

/// Metrics tracked per branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchMetrics {
    /// Events handed over to the engine.
    pub events_emitted: u64,
    /// Total time spent blocked waiting for acknowledgements.
    pub ack_wait_ms: u64,
    /// Wall time from start to final state.
    pub duration_ms: u64,
}

/// Real-time snapshot of a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchState {
    /// Branch identity.
    pub branch: BranchId,
    /// Current lifecycle state.
    pub status: BranchStatus,
    /// Accumulated metrics.
    pub metrics: BranchMetrics,
    /// Failure description when `status` is `Failed`.
    pub last_error: Option<String>,
}

impl BranchState {
    /// A freshly registered branch.
    pub fn pending(branch: BranchId) -> Self {
        Self {
            branch,
            status: BranchStatus::Pending,
            metrics: BranchMetrics::default(),
            last_error: None,
        }
    }
}
