use crate::branch::{Branch, EventEmitter};
use crate::merge::{MergeEngine, MergeItem};
use async_trait::async_trait;
use tracing::{debug, info, warn};
use warroom_core::{WarroomError, WarroomResult};

/// Runs its children concurrently and re-emits their events as its own.
///
/// The children go through a nested [`MergeEngine`]. A child event is only
/// acknowledged inside once the outer consumer acknowledged the forwarded
/// copy, so back-pressure holds end to end. If any child fails, the parallel
/// branch fails after the remaining children have drained.
pub struct ParallelBranch {
    name: String,
    children: Vec<Box<dyn Branch>>,
}

impl ParallelBranch {
    /// Group `children` under `name`.
    pub fn new(name: impl Into<String>, children: Vec<Box<dyn Branch>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

#[async_trait]
impl Branch for ParallelBranch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, emitter: &mut EventEmitter) -> WarroomResult<()> {
        let ParallelBranch { name, children } = *self;
        let total = children.len();
        let mut inner = MergeEngine::new(children)?;
        info!(branch = %name, children = total, "Parallel group started");

        let mut failed = Vec::new();
        while let Some(item) = inner.next().await {
            match item {
                MergeItem::Event(event) => {
                    if let Err(e) = emitter.forward(event).await {
                        inner.cancel().await;
                        return Err(e);
                    }
                }
                MergeItem::Failed { branch, error } => {
                    warn!(group = %name, child = %branch, error = %error, "Parallel child failed");
                    failed.push(format!("{}: {error}", branch.name));
                }
            }
        }
        inner.cancel().await;

        if failed.is_empty() {
            info!(branch = %name, "Parallel group finished");
            Ok(())
        } else {
            Err(WarroomError::branch(
                emitter.branch().clone(),
                format!(
                    "{} of {total} parallel branches failed: {}",
                    failed.len(),
                    failed.join("; ")
                ),
            ))
        }
    }
}

/// Runs its children one after another on the same emitter.
///
/// The first failing child stops the sequence and fails it.
pub struct SequentialBranch {
    name: String,
    children: Vec<Box<dyn Branch>>,
}

impl SequentialBranch {
    /// Chain `children` under `name`.
    pub fn new(name: impl Into<String>, children: Vec<Box<dyn Branch>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

#[async_trait]
impl Branch for SequentialBranch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>, emitter: &mut EventEmitter) -> WarroomResult<()> {
        let SequentialBranch { name, children } = *self;
        let total = children.len();
        for (position, child) in children.into_iter().enumerate() {
            let child_name = child.name().to_string();
            debug!(sequence = %name, child = %child_name, position, total, "Sequence step");
            if let Err(e) = child.run(emitter).await {
                warn!(sequence = %name, child = %child_name, error = %e, "Sequence aborted");
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::branch::StreamBranch;
    use futures_util::stream;
    use warroom_core::EventContent;

    fn texts(name: &str, n: usize) -> Box<dyn Branch> {
        let items: Vec<WarroomResult<EventContent>> = (0..n)
            .map(|i| Ok(EventContent::text(format!("{name}-{i}"))))
            .collect();
        Box::new(StreamBranch::new(name, stream::iter(items)))
    }

    fn failing(name: &str) -> Box<dyn Branch> {
        let items: Vec<WarroomResult<EventContent>> = vec![
            Ok(EventContent::text(format!("{name}-0"))),
            Err(WarroomError::Agent(format!("{name} broke"))),
        ];
        Box::new(StreamBranch::new(name, stream::iter(items)))
    }

    async fn collect(engine: &mut MergeEngine) -> (Vec<String>, Vec<MergeItem>) {
        let mut texts = Vec::new();
        let mut failures = Vec::new();
        while let Some(item) = engine.next().await {
            match &item {
                MergeItem::Event(e) => texts.push(e.content().as_text().unwrap().to_string()),
                MergeItem::Failed { .. } => failures.push(item),
            }
        }
        (texts, failures)
    }

    #[tokio::test]
    async fn test_sequential_preserves_child_order() {
        let seq = SequentialBranch::new("seq", vec![texts("a", 2), texts("b", 1)]);
        let mut engine = MergeEngine::new(vec![Box::new(seq)]).unwrap();
        let (texts, failures) = collect(&mut engine).await;
        assert_eq!(texts, vec!["a-0", "a-1", "b-0"]);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_stops_at_first_failure() {
        let seq = SequentialBranch::new("seq", vec![failing("a"), texts("b", 2)]);
        let mut engine = MergeEngine::new(vec![Box::new(seq)]).unwrap();
        let (texts, failures) = collect(&mut engine).await;
        assert_eq!(texts, vec!["a-0"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].branch().name, "seq");
    }

    #[tokio::test]
    async fn test_parallel_forwards_every_child_event() {
        let par = ParallelBranch::new("par", vec![texts("x", 2), texts("y", 0), texts("z", 1)]);
        let mut engine = MergeEngine::new(vec![Box::new(par)]).unwrap();
        let (mut texts, failures) = collect(&mut engine).await;
        texts.sort();
        assert_eq!(texts, vec!["x-0", "x-1", "z-0"]);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_parallel_fails_after_siblings_drain() {
        let par = ParallelBranch::new("par", vec![failing("bad"), texts("good", 2)]);
        let mut engine = MergeEngine::new(vec![Box::new(par)]).unwrap();
        let (texts, failures) = collect(&mut engine).await;
        assert_eq!(texts.len(), 3);
        assert_eq!(failures.len(), 1);
        let MergeItem::Failed { error, .. } = &failures[0] else {
            unreachable!()
        };
        assert!(error.to_string().contains("1 of 2 parallel branches failed"));
        assert!(error.to_string().contains("bad broke"));
    }

    #[tokio::test]
    async fn test_empty_parallel_group_is_config_error() {
        let par = ParallelBranch::new("par", Vec::new());
        let mut engine = MergeEngine::new(vec![Box::new(par)]).unwrap();
        match engine.next().await {
            Some(MergeItem::Failed { error, .. }) => {
                assert!(matches!(error, WarroomError::Config(_)))
            }
            other => panic!("expected config failure, got {other:?}"),
        }
    }
}
