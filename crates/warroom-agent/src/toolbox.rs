use crate::session::SessionState;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use warroom_builtins::Collaborators;
use warroom_core::{ToolCall, ToolResult};
use warroom_security::{AuditLog, AuditOutcome, PermissionSet};
use warroom_skills::SkillRegistry;

/// Everything an agent reaches the outside world through, built once at
/// start-up and shared by every agent of a run.
pub struct Toolbox {
    skills: Arc<SkillRegistry>,
    audit: Option<Arc<AuditLog>>,
    session: SessionState,
    run_id: Uuid,
}

impl Toolbox {
    /// Toolbox exposing every skill over `collaborators`.
    pub fn new(collaborators: &Collaborators) -> Self {
        let mut registry = SkillRegistry::new();
        collaborators.register(&mut registry);
        Self::from_registry(registry)
    }

    /// Toolbox over an already populated registry.
    pub fn from_registry(skills: SkillRegistry) -> Self {
        Self {
            skills: Arc::new(skills),
            audit: None,
            session: SessionState::new(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Record every tool call in `audit`.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// The skill registry.
    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    /// State shared by the agents of this run.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Identifier stamped on audit entries.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run `call` on behalf of `agent` with `permissions`, auditing the call
    /// and its outcome. Dispatch failures come back as an error result.
    pub async fn execute(
        &self,
        agent: &str,
        call: ToolCall,
        permissions: &PermissionSet,
    ) -> ToolResult {
        info!(agent = %agent, tool = %call.name, call_id = %call.id, "Executing tool call");
        self.audit(
            agent,
            "tool_call",
            &call.name,
            serde_json::json!({"call_id": call.id, "arguments": call.arguments}),
            AuditOutcome::Success,
        );

        let name = call.name.clone();
        let call_id = call.id.clone();
        match self.skills.execute(call, permissions).await {
            Ok(result) => {
                let outcome = if result.content.starts_with("Permission denied") {
                    AuditOutcome::Denied
                } else if result.is_error {
                    AuditOutcome::Error
                } else {
                    AuditOutcome::Success
                };
                self.audit(
                    agent,
                    "tool_result",
                    &name,
                    serde_json::json!({"call_id": result.call_id, "is_error": result.is_error}),
                    outcome,
                );
                result
            }
            Err(e) => {
                error!(agent = %agent, tool = %name, error = %e, "Tool execution failed");
                self.audit(
                    agent,
                    "tool_error",
                    &name,
                    serde_json::json!({"error": e.to_string()}),
                    AuditOutcome::Error,
                );
                ToolResult::error(call_id, format!("Tool error: {e}"))
            }
        }
    }

    /// Audit the final answer `agent` published under `output_key`.
    pub fn record_response(&self, agent: &str, output_key: &str, summary: &str) {
        if let Some(audit) = &self.audit {
            audit.log_action(
                self.run_id,
                agent,
                "agent_response",
                None,
                serde_json::json!({"output_key": output_key, "summary": summary}),
                AuditOutcome::Success,
            );
        }
    }

    fn audit(
        &self,
        agent: &str,
        action: &str,
        skill: &str,
        details: serde_json::Value,
        outcome: AuditOutcome,
    ) {
        if let Some(audit) = &self.audit {
            audit.log_action(
                self.run_id,
                agent,
                action,
                Some(skill.to_string()),
                details,
                outcome,
            );
        }
    }
}
