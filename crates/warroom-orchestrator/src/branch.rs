use crate::monitor::BranchMonitor;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use warroom_core::{BranchId, Event, EventContent, WarroomError, WarroomResult};

/// What a branch task sends over the merge engine's delivery channel.
pub(crate) enum Signal {
    /// One event, plus the handle the consumer side uses to let the branch go on.
    Event {
        event: Event,
        resume: oneshot::Sender<()>,
    },
    /// The branch is done; sent exactly once, after its last event was acknowledged.
    Finished {
        branch: BranchId,
        outcome: WarroomResult<()>,
    },
}

/// One independently executing producer of an ordered event sequence.
///
/// A branch hands its events to the [`EventEmitter`] it is given. Every
/// `emit` suspends until the consumer acknowledged the event, so a branch is
/// never more than one event ahead of whoever reads the merged stream.
/// Returning `Ok(())` signals normal completion; returning `Err` is a branch
/// failure that the merge engine surfaces as a distinct item.
#[async_trait]
pub trait Branch: Send {
    /// Diagnostic name, usually the agent name.
    fn name(&self) -> &str;

    /// Produce the whole event sequence through `emitter`.
    async fn run(self: Box<Self>, emitter: &mut EventEmitter) -> WarroomResult<()>;
}

/// Handle a running branch uses to hand events to the merge engine.
///
/// Every method takes `&mut self` and only returns once the event was
/// acknowledged, so a second event can't be in flight before the first.
pub struct EventEmitter {
    branch: BranchId,
    tx: mpsc::Sender<Signal>,
    monitor: Option<Arc<BranchMonitor>>,
}

impl EventEmitter {
    pub(crate) fn new(
        branch: BranchId,
        tx: mpsc::Sender<Signal>,
        monitor: Option<Arc<BranchMonitor>>,
    ) -> Self {
        Self {
            branch,
            tx,
            monitor,
        }
    }

    /// Identity stamped on every event this emitter produces.
    pub fn branch(&self) -> &BranchId {
        &self.branch
    }

    pub(crate) fn monitor(&self) -> Option<Arc<BranchMonitor>> {
        self.monitor.clone()
    }

    /// Emit a non-terminal event authored by `author`.
    pub async fn emit(
        &mut self,
        author: impl Into<String> + Send,
        content: EventContent,
    ) -> WarroomResult<()> {
        let event = Event::new(self.branch.clone(), author, content);
        self.send(event).await
    }

    /// Emit an event flagged as the final meaningful output of the run.
    pub async fn emit_terminal(
        &mut self,
        author: impl Into<String> + Send,
        content: EventContent,
    ) -> WarroomResult<()> {
        let event = Event::new(self.branch.clone(), author, content).terminal();
        self.send(event).await
    }

    /// Re-emit an event produced elsewhere (e.g. by a nested merge),
    /// attributing it to this emitter's branch.
    pub async fn forward(&mut self, event: Event) -> WarroomResult<()> {
        let event = event.reattributed(self.branch.clone());
        self.send(event).await
    }

    async fn send(&mut self, event: Event) -> WarroomResult<()> {
        let (resume_tx, resume_rx) = oneshot::channel();
        self.tx
            .send(Signal::Event {
                event,
                resume: resume_tx,
            })
            .await
            .map_err(|_| merge_cancelled())?;

        if let Some(monitor) = &self.monitor {
            monitor.event_emitted(self.branch.index).await;
        }
        let waiting = Instant::now();

        // Dropped sender means the engine was cancelled while we waited.
        resume_rx.await.map_err(|_| merge_cancelled())?;

        if let Some(monitor) = &self.monitor {
            monitor
                .acknowledged(self.branch.index, waiting.elapsed().as_millis() as u64)
                .await;
        }
        Ok(())
    }
}

fn merge_cancelled() -> WarroomError {
    WarroomError::Orchestrator("merge cancelled".to_string())
}

/// A branch backed by any stream of payloads.
///
/// The stream is polled lazily: the next item is only requested after the
/// previous event was acknowledged. An `Err` item fails the branch.
pub struct StreamBranch {
    name: String,
    stream: Pin<Box<dyn Stream<Item = WarroomResult<EventContent>> + Send>>,
}

impl StreamBranch {
    /// Wrap `stream`; events are authored by `name`.
    pub fn new(
        name: impl Into<String>,
        stream: impl Stream<Item = WarroomResult<EventContent>> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            stream: Box::pin(stream),
        }
    }
}

#[async_trait]
impl Branch for StreamBranch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, emitter: &mut EventEmitter) -> WarroomResult<()> {
        let StreamBranch { name, mut stream } = *self;
        while let Some(item) = stream.next().await {
            emitter.emit(name.as_str(), item?).await?;
        }
        Ok(())
    }
}

type BranchFn =
    Box<dyn for<'a> FnOnce(&'a mut EventEmitter) -> BoxFuture<'a, WarroomResult<()>> + Send>;

/// A branch backed by a closure that receives the emitter.
///
/// ```ignore
/// let branch = FnBranch::new("probe", |emitter| {
///     Box::pin(async move {
///         emitter.emit("probe", EventContent::text("ping")).await
///     })
/// });
/// ```
pub struct FnBranch {
    name: String,
    func: BranchFn,
}

impl FnBranch {
    /// Wrap `func` as a branch named `name`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut EventEmitter) -> BoxFuture<'a, WarroomResult<()>>
            + Send
            + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Branch for FnBranch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, emitter: &mut EventEmitter) -> WarroomResult<()> {
        (self.func)(emitter).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn emitter(capacity: usize) -> (EventEmitter, mpsc::Receiver<Signal>) {
        let (tx, rx) = mpsc::channel(capacity);
        (EventEmitter::new(BranchId::new(3, "legal_agent"), tx, None), rx)
    }

    #[tokio::test]
    async fn test_emit_waits_for_resume() {
        let (mut emitter, mut rx) = emitter(1);
        let producer = tokio::spawn(async move {
            emitter.emit("legal_agent", EventContent::text("clause found")).await
        });

        let Some(Signal::Event { event, resume }) = rx.recv().await else {
            panic!("expected an event");
        };
        assert_eq!(event.branch().index, 3);
        assert_eq!(event.author(), "legal_agent");
        assert!(!producer.is_finished());

        resume.send(()).unwrap();
        producer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dropped_resume_reports_cancellation() {
        let (mut emitter, mut rx) = emitter(1);
        let producer =
            tokio::spawn(async move { emitter.emit("legal_agent", EventContent::text("x")).await });

        let Some(Signal::Event { resume, .. }) = rx.recv().await else {
            panic!("expected an event");
        };
        drop(resume);
        let err = producer.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("merge cancelled"));
    }

    #[tokio::test]
    async fn test_closed_channel_reports_cancellation() {
        let (mut emitter, rx) = emitter(1);
        drop(rx);
        let err = emitter
            .emit("legal_agent", EventContent::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, WarroomError::Orchestrator(_)));
    }

    #[tokio::test]
    async fn test_forward_reattributes() {
        let (mut emitter, mut rx) = emitter(1);
        let inner = Event::new(BranchId::new(0, "child"), "inventory_agent", EventContent::text("x"))
            .terminal();
        let producer = tokio::spawn(async move { emitter.forward(inner).await });

        let Some(Signal::Event { event, resume }) = rx.recv().await else {
            panic!("expected an event");
        };
        assert_eq!(event.branch().name, "legal_agent");
        assert_eq!(event.author(), "inventory_agent");
        assert!(event.is_terminal());
        resume.send(()).unwrap();
        producer.await.unwrap().unwrap();
    }
}
