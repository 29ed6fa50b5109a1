use crate::merge::{CancelSummary, MergeEngine, MergeItem};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use warroom_core::{BranchId, Event, WarroomError, WarroomResult};

/// Consumer policy applied while pulling from a [`MergeEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Upper bound on merged items (events and failures) handled in one run.
    pub max_steps: usize,
    /// Cancel the remaining branches as soon as a terminal event arrives.
    pub stop_on_terminal: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            stop_on_terminal: true,
        }
    }
}

impl DriverConfig {
    /// Reject settings the driver can't honour.
    pub fn validate(&self) -> WarroomResult<()> {
        if self.max_steps == 0 {
            return Err(WarroomError::Config(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// How a driven run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every branch finished normally and the merged stream was exhausted.
    Completed,
    /// A terminal event arrived and the remaining branches were cancelled.
    FinalResponse,
    /// The step budget ran out; remaining branches were cancelled.
    /// A safety stop, not an error.
    StepLimitExceeded {
        /// The budget that was hit.
        max_steps: usize,
    },
    /// At least one branch failed.
    PartialFailure {
        /// The branches that failed, in the order their failures arrived.
        failed: Vec<BranchId>,
    },
}

/// A branch failure observed during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    /// The failing branch.
    pub branch: BranchId,
    /// Rendered error.
    pub error: String,
}

/// Result of [`Driver::run`].
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// How the run ended.
    pub status: RunStatus,
    /// Items handled (events plus failure signals).
    pub steps: usize,
    /// The terminal event if one arrived, otherwise the last event handled.
    pub final_event: Option<Event>,
    /// Every branch failure seen.
    pub failures: Vec<FailureReport>,
    /// What the final cancellation found.
    pub cancelled: CancelSummary,
    /// Wall time of the run.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// `Completed` or `FinalResponse`.
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::FinalResponse)
    }
}

/// Pulls merged items one at a time and decides when to stop.
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    /// Create a driver; fails on an invalid config.
    pub fn new(config: DriverConfig) -> WarroomResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active policy.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Drive `engine` to the end of the run.
    ///
    /// `on_step` sees every handled item with its 1-based step number before
    /// the driver acts on it. After `max_steps` items it never pulls again,
    /// so no branch is resumed past the budget; the run counts as
    /// `StepLimitExceeded` unless every branch had already finished.
    /// The engine is always cancelled on the way out,
    /// so no branch task outlives this call.
    pub async fn run<F>(&self, mut engine: MergeEngine, mut on_step: F) -> RunReport
    where
        F: FnMut(usize, &MergeItem),
    {
        let started = Instant::now();
        let mut steps = 0usize;
        let mut failures = Vec::new();
        let mut final_event: Option<Event> = None;
        let mut hit_step_limit = false;
        let mut stopped_on_terminal = false;

        info!(
            branches = engine.branch_count(),
            max_steps = self.config.max_steps,
            stop_on_terminal = self.config.stop_on_terminal,
            "Driver started"
        );

        loop {
            // Pulling again would resume the branch behind the last item.
            if steps == self.config.max_steps {
                if !engine.is_drained() {
                    warn!(
                        max_steps = self.config.max_steps,
                        finished = engine.finished_count(),
                        branches = engine.branch_count(),
                        "Step limit reached, cancelling remaining branches"
                    );
                    hit_step_limit = true;
                }
                break;
            }
            let Some(item) = engine.next().await else {
                break;
            };
            steps += 1;
            on_step(steps, &item);

            match item {
                MergeItem::Event(event) => {
                    debug!(step = steps, branch = %event.branch(), author = event.author(), "Step");
                    let terminal = event.is_terminal();
                    let keep_previous = final_event.as_ref().is_some_and(Event::is_terminal);
                    if terminal || !keep_previous {
                        final_event = Some(event);
                    }
                    if terminal && self.config.stop_on_terminal {
                        info!(step = steps, "Terminal event received");
                        stopped_on_terminal = true;
                        break;
                    }
                }
                MergeItem::Failed { branch, error } => {
                    warn!(step = steps, branch = %branch, error = %error, "Branch failure observed");
                    failures.push(FailureReport {
                        branch,
                        error: error.to_string(),
                    });
                }
            }
        }

        let cancelled = engine.cancel().await;

        let status = if hit_step_limit {
            RunStatus::StepLimitExceeded {
                max_steps: self.config.max_steps,
            }
        } else if !failures.is_empty() {
            RunStatus::PartialFailure {
                failed: failures.iter().map(|f| f.branch.clone()).collect(),
            }
        } else if stopped_on_terminal {
            RunStatus::FinalResponse
        } else {
            RunStatus::Completed
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(status = ?status, steps, elapsed_ms, "Driver finished");

        RunReport {
            status,
            steps,
            final_event,
            failures,
            cancelled,
            elapsed_ms,
        }
    }
}
