use crate::branch::{Branch, EventEmitter, Signal};
use crate::monitor::BranchMonitor;
use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use warroom_core::{BranchId, Event, WarroomError, WarroomResult};

/// One item of the merged stream.
#[derive(Debug)]
pub enum MergeItem {
    /// An event produced by one of the branches.
    Event(Event),
    /// A branch ended with an error (or panicked) instead of completing.
    Failed {
        /// The failing branch.
        branch: BranchId,
        /// What went wrong.
        error: WarroomError,
    },
}

impl MergeItem {
    /// The branch this item came from.
    pub fn branch(&self) -> &BranchId {
        match self {
            Self::Event(event) => event.branch(),
            Self::Failed { branch, .. } => branch,
        }
    }

    /// The event, if this item carries one.
    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Failed { .. } => None,
        }
    }

    /// Whether this item is an event flagged terminal.
    pub fn is_terminal(&self) -> bool {
        self.as_event().is_some_and(Event::is_terminal)
    }
}

/// Outcome of [`MergeEngine::cancel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CancelSummary {
    /// Branches whose completion the engine had already observed.
    pub finished: usize,
    /// Branch tasks that were still running and got aborted.
    pub aborted: usize,
}

/// Fan-in merge of N branches with per-event back-pressure.
///
/// Branches run as tokio tasks and hand events over a capacity-1 channel.
/// [`next`](Self::next) yields events in true completion order; the branch
/// that produced an event stays suspended until the consumer resumes it,
/// either explicitly via [`resume`](Self::resume) or implicitly on the
/// following `next` call.
///
/// Dropping the engine aborts all branch tasks. [`cancel`](Self::cancel)
/// does the same and also waits for them to terminate.
pub struct MergeEngine {
    pending: Vec<Box<dyn Branch>>,
    ids: Vec<BranchId>,
    tx: Option<mpsc::Sender<Signal>>,
    rx: mpsc::Receiver<Signal>,
    tasks: JoinSet<()>,
    resume: Option<(usize, oneshot::Sender<()>)>,
    in_flight: Vec<bool>,
    finished: usize,
    started: bool,
    exhausted: bool,
    monitor: Option<Arc<BranchMonitor>>,
}

impl MergeEngine {
    /// Build an engine over `branches`. No work starts until the first `next`.
    ///
    /// An empty collection is a configuration error: a merge of nothing has
    /// no completion signal to wait for.
    pub fn new(branches: Vec<Box<dyn Branch>>) -> WarroomResult<Self> {
        if branches.is_empty() {
            return Err(WarroomError::Config(
                "merge engine requires at least one branch".to_string(),
            ));
        }

        let ids: Vec<BranchId> = branches
            .iter()
            .enumerate()
            .map(|(index, branch)| BranchId::new(index, branch.name()))
            .collect();
        let (tx, rx) = mpsc::channel(1);

        Ok(Self {
            in_flight: vec![false; ids.len()],
            pending: branches,
            ids,
            tx: Some(tx),
            rx,
            tasks: JoinSet::new(),
            resume: None,
            finished: 0,
            started: false,
            exhausted: false,
            monitor: None,
        })
    }

    /// Report branch status and metrics into `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<BranchMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Identities of all branches, in construction order.
    pub fn branch_ids(&self) -> &[BranchId] {
        &self.ids
    }

    /// Number of branches.
    pub fn branch_count(&self) -> usize {
        self.ids.len()
    }

    /// Branches whose completion (normal or failed) has been observed.
    pub fn finished_count(&self) -> usize {
        self.finished
    }

    /// Every branch has finished and the merged stream is exhausted.
    pub fn is_drained(&self) -> bool {
        self.finished == self.ids.len()
    }

    /// Acknowledge the last delivered event, letting its branch continue.
    /// A no-op when nothing is waiting.
    pub fn resume(&mut self) {
        if let Some((index, resume)) = self.resume.take() {
            self.in_flight[index] = false;
            // Err only if the branch task is gone already.
            let _ = resume.send(());
        }
    }

    /// Pull the next merged item, or `None` once every branch has finished.
    ///
    /// Resumes the previously delivered event's branch first. After `None`
    /// has been returned, every further call returns `None` again.
    pub async fn next(&mut self) -> Option<MergeItem> {
        self.resume();
        if !self.started {
            self.start().await;
        }

        loop {
            if self.is_drained() {
                if !self.exhausted {
                    self.exhausted = true;
                    info!(branches = self.ids.len(), "Merged stream exhausted");
                }
                return None;
            }

            let Some(signal) = self.rx.recv().await else {
                // Every sender is gone without a completion signal: the
                // tasks were torn down underneath us.
                error!(
                    finished = self.finished,
                    branches = self.ids.len(),
                    "Delivery channel closed before all branches finished"
                );
                self.finished = self.ids.len();
                continue;
            };

            match signal {
                Signal::Event { event, resume } => {
                    let index = event.branch().index;
                    if self.in_flight[index] {
                        let branch = event.branch().clone();
                        error!(branch = %branch, "Branch produced an event before acknowledgement");
                        drop(resume);
                        return Some(MergeItem::Failed {
                            error: WarroomError::Backpressure {
                                branch: branch.clone(),
                            },
                            branch,
                        });
                    }
                    debug!(branch = %event.branch(), event_id = %event.id(), "Event delivered");
                    self.in_flight[index] = true;
                    self.resume = Some((index, resume));
                    return Some(MergeItem::Event(event));
                }
                Signal::Finished { branch, outcome } => {
                    self.finished += 1;
                    self.in_flight[branch.index] = false;
                    match outcome {
                        Ok(()) => {
                            debug!(
                                branch = %branch,
                                finished = self.finished,
                                branches = self.ids.len(),
                                "Branch finished"
                            );
                        }
                        Err(error) => {
                            warn!(branch = %branch, error = %error, "Branch failed");
                            return Some(MergeItem::Failed { branch, error });
                        }
                    }
                }
            }
        }
    }

    /// Stop the merge: release any branch waiting for acknowledgement, abort
    /// every branch task and wait until they are gone.
    ///
    /// Never fails; cancelling an exhausted engine only joins the tasks.
    pub async fn cancel(mut self) -> CancelSummary {
        self.rx.close();
        // Dropping the handle wakes the waiting branch with an error.
        self.resume = None;
        self.tasks.abort_all();

        let mut summary = CancelSummary {
            finished: self.finished,
            aborted: 0,
        };
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => summary.aborted += 1,
                Err(e) => warn!(error = %e, "Branch task ended abnormally"),
            }
        }

        if let Some(monitor) = &self.monitor {
            monitor.cancel_unfinished().await;
        }
        info!(
            finished = summary.finished,
            aborted = summary.aborted,
            branches = self.ids.len(),
            "Merge cancelled"
        );
        summary
    }

    async fn start(&mut self) {
        self.started = true;
        let Some(tx) = self.tx.take() else {
            return;
        };

        let branches = std::mem::take(&mut self.pending);
        for (branch, id) in branches.into_iter().zip(self.ids.iter().cloned()) {
            if let Some(monitor) = &self.monitor {
                monitor.register(&id).await;
            }
            let emitter = EventEmitter::new(id, tx.clone(), self.monitor.clone());
            self.tasks.spawn(run_branch(branch, emitter, tx.clone()));
        }
        info!(branches = self.ids.len(), "Merge started");
    }
}

async fn run_branch(branch: Box<dyn Branch>, mut emitter: EventEmitter, tx: mpsc::Sender<Signal>) {
    let id = emitter.branch().clone();
    let monitor = emitter.monitor();
    if let Some(monitor) = &monitor {
        monitor.start(id.index).await;
    }
    let started = Instant::now();

    let outcome = match AssertUnwindSafe(branch.run(&mut emitter))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(WarroomError::branch(
            id.clone(),
            format!("branch panicked: {}", panic_message(panic.as_ref())),
        )),
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    if let Some(monitor) = &monitor {
        match &outcome {
            Ok(()) => monitor.finish(id.index, duration_ms).await,
            Err(e) => monitor.fail(id.index, e.to_string(), duration_ms).await,
        }
    }

    if tx
        .send(Signal::Finished {
            branch: id.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        debug!(branch = %id, "Merge gone before completion was delivered");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
