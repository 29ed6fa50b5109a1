//! Concurrent multi-branch event merging with per-event back-pressure.
//!
//! Several independent execution branches (one agent run each) produce
//! [`Event`](warroom_core::Event)s concurrently. The [`MergeEngine`]
//! interleaves them into one ordered stream in true completion order while
//! guaranteeing that no branch gets more than one event ahead of the
//! consumer. The [`Driver`] pulls from the engine under a step budget and
//! decides when to stop.
//!
//! # Main types
//!
//! - [`Branch`]: One producer of an ordered event sequence.
//! - [`EventEmitter`]: The handle a branch uses to hand over events.
//! - [`MergeEngine`]: Fan-in merge with single-slot rendezvous and ordered shutdown.
//! - [`Driver`]: Consumer loop applying `max_steps` and stop-on-terminal policy.
//! - [`ParallelBranch`] / [`SequentialBranch`]: Composite branches.
//! - [`BranchMonitor`]: Per-branch status and metrics.

/// Branch trait, emitter, and adapters.
pub mod branch;
/// Consumer driver and run reports.
pub mod driver;
/// The merge engine.
pub mod merge;
/// Per-branch monitoring.
pub mod monitor;
/// Sequential and parallel composition of branches.
pub mod pipeline;
/// Shared orchestration types (status, metrics).
pub mod types;

pub use branch::{Branch, EventEmitter, FnBranch, StreamBranch};
pub use driver::{Driver, DriverConfig, FailureReport, RunReport, RunStatus};
pub use merge::{CancelSummary, MergeEngine, MergeItem};
pub use monitor::BranchMonitor;
pub use pipeline::{ParallelBranch, SequentialBranch};
pub use types::{BranchMetrics, BranchState, BranchStatus};
