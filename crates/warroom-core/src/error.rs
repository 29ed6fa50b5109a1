use crate::event::BranchId;
use thiserror::Error;

/// A convenience `Result` alias using [`WarroomError`].
pub type WarroomResult<T> = Result<T, WarroomError>;

/// Top-level error type for the War Room pipeline.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum WarroomError {
    /// Invalid setup detected before any concurrent work starts
    /// (e.g. a merge of zero branches, a missing configuration key).
    #[error("Config error: {0}")]
    Config(String),

    /// The underlying work of an execution branch failed.
    #[error("Branch '{branch}' failed: {message}")]
    Branch {
        /// The branch that failed.
        branch: BranchId,
        /// Human-readable failure description.
        message: String,
    },

    /// A branch tried to hand over a second event before the first was acknowledged.
    #[error("Backpressure violation: branch '{branch}' produced an event while one was still in flight")]
    Backpressure {
        /// The misbehaving branch.
        branch: BranchId,
    },

    /// An error originating from an agent's step loop.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error raised while dispatching or running a skill.
    #[error("Skill error: {0}")]
    Skill(String),

    /// An error from the tabular query store.
    #[error("Database error: {0}")]
    Database(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A security-related error (sandbox escape attempt, missing capability).
    #[error("Security error: {0}")]
    Security(String),

    /// An error while persisting or publishing a report.
    #[error("Report error: {0}")]
    Report(String),

    /// An error from the merge engine or the driver.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WarroomError {
    /// Build a [`WarroomError::Branch`] for the given branch.
    pub fn branch(branch: BranchId, message: impl Into<String>) -> Self {
        Self::Branch {
            branch,
            message: message.into(),
        }
    }

    /// Whether this error reports a broken branch contract rather than a failed workload.
    pub fn is_backpressure_violation(&self) -> bool {
        matches!(self, Self::Backpressure { .. })
    }
}
