use crate::playbook::{Playbook, Step, TurnContext};
use crate::profiles::AgentProfile;
use crate::toolbox::Toolbox;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use warroom_core::{EventContent, ToolResult, WarroomError, WarroomResult};
use warroom_orchestrator::{Branch, EventEmitter};

/// The agent runner: one agent as a merge-engine branch.
/// Plan → ToolCall → Execute Skill → ToolResult → Repeat, until the
/// playbook finishes or the turn budget runs out.
pub struct AgentRunner {
    profile: AgentProfile,
    playbook: Box<dyn Playbook>,
    toolbox: Arc<Toolbox>,
}

impl AgentRunner {
    /// Runner for `profile`, choosing steps with `playbook`.
    pub fn new(profile: AgentProfile, playbook: Box<dyn Playbook>, toolbox: Arc<Toolbox>) -> Self {
        Self {
            profile,
            playbook,
            toolbox,
        }
    }

    /// The agent's profile.
    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }
}

#[async_trait]
impl Branch for AgentRunner {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn run(self: Box<Self>, emitter: &mut EventEmitter) -> WarroomResult<()> {
        let Self {
            profile,
            mut playbook,
            toolbox,
        } = *self;
        let author = profile.name.as_str();
        info!(agent = %author, branch = %emitter.branch(), "Starting agent");

        let mut last_result: Option<ToolResult> = None;
        for turn in 1..=profile.max_turns {
            let session = toolbox.session().snapshot().await;
            let step = playbook.next_step(&TurnContext {
                turn,
                session: &session,
                last_result: last_result.as_ref(),
            })?;

            match step {
                Step::Call(call) => {
                    emitter
                        .emit(author, EventContent::ToolCall { call: call.clone() })
                        .await?;
                    let result = toolbox.execute(author, call, &profile.permissions).await;
                    emitter
                        .emit(
                            author,
                            EventContent::ToolResult {
                                result: result.clone(),
                            },
                        )
                        .await?;
                    last_result = Some(result);
                }
                Step::Finish(output) => {
                    let value = output.to_value();
                    toolbox
                        .session()
                        .set(profile.output_key.as_str(), value.clone())
                        .await;
                    emitter
                        .emit(
                            author,
                            EventContent::StateDelta {
                                key: profile.output_key.clone(),
                                value,
                            },
                        )
                        .await?;

                    toolbox.record_response(author, &profile.output_key, &output.summary);
                    let text = EventContent::text(output.summary);
                    if profile.terminal {
                        emitter.emit_terminal(author, text).await?;
                    } else {
                        emitter.emit(author, text).await?;
                    }
                    info!(agent = %author, turns = turn, "Agent finished");
                    return Ok(());
                }
            }
        }

        warn!(agent = %author, max_turns = profile.max_turns, "Agent reached max turns");
        Err(WarroomError::Agent(format!(
            "{author} exceeded maximum of {} turns",
            profile.max_turns
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::playbook::AgentOutput;
    use crate::profiles::{commander_profile, legal_profile};
    use warroom_orchestrator::{MergeEngine, MergeItem};
    use warroom_skills::SkillRegistry;

    /// Calls `list_files` `calls` times, then finishes.
    struct Counting {
        calls: u32,
    }

    impl Playbook for Counting {
        fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step> {
            if ctx.turn <= self.calls {
                Ok(Step::call("list_files", serde_json::json!({})))
            } else {
                Ok(Step::Finish(AgentOutput::new(
                    "done",
                    serde_json::json!({"turns": ctx.turn}),
                )))
            }
        }
    }

    async fn collect(runner: AgentRunner) -> Vec<MergeItem> {
        let mut engine = MergeEngine::new(vec![Box::new(runner)]).unwrap();
        let mut items = Vec::new();
        while let Some(item) = engine.next().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_tool_steps_then_state_and_text() {
        let toolbox = Arc::new(Toolbox::from_registry(SkillRegistry::new()));
        let runner = AgentRunner::new(legal_profile(), Box::new(Counting { calls: 1 }), toolbox.clone());
        let items = collect(runner).await;

        let contents: Vec<&EventContent> = items
            .iter()
            .map(|i| i.as_event().unwrap().content())
            .collect();
        assert_eq!(contents.len(), 4);
        assert!(matches!(contents[0], EventContent::ToolCall { .. }));
        assert!(matches!(contents[1], EventContent::ToolResult { result } if result.is_error));
        assert!(matches!(contents[2], EventContent::StateDelta { key, .. } if key == "legal_agent_result"));
        assert_eq!(contents[3].as_text(), Some("done"));
        assert!(!items[3].is_terminal());

        let stored = toolbox.session().get("legal_agent_result").await.unwrap();
        assert_eq!(stored["data"]["turns"], 2);
    }

    #[tokio::test]
    async fn test_terminal_profile_marks_final_text() {
        let toolbox = Arc::new(Toolbox::from_registry(SkillRegistry::new()));
        let runner = AgentRunner::new(commander_profile(), Box::new(Counting { calls: 0 }), toolbox);
        let items = collect(runner).await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_terminal());
        assert_eq!(items[1].as_event().unwrap().author(), "root_agent");
    }

    #[tokio::test]
    async fn test_turn_budget_exhaustion_fails_agent() {
        let toolbox = Arc::new(Toolbox::from_registry(SkillRegistry::new()));
        let mut profile = legal_profile();
        profile.max_turns = 2;
        let runner = AgentRunner::new(profile, Box::new(Counting { calls: 10 }), toolbox);
        let items = collect(runner).await;

        assert_eq!(items.len(), 5);
        match &items[4] {
            MergeItem::Failed { branch, error } => {
                assert_eq!(branch.name, "legal_agent");
                assert!(error.to_string().contains("exceeded maximum of 2 turns"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
