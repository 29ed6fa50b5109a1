use crate::skill::{Skill, SkillDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use warroom_core::{ToolCall, ToolResult, WarroomError, WarroomResult};
use warroom_security::PermissionSet;

/// Central registry for all available skills.
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            skills: BTreeMap::new(),
        }
    }

    /// Register a skill, replacing any previous skill with the same name.
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.descriptor().name.clone();
        info!(skill = %name, "Registered skill");
        self.skills.insert(name, skill);
    }

    /// Look up a skill by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }

    /// Descriptors of all registered skills, sorted by name.
    pub fn list_descriptors(&self) -> Vec<&SkillDescriptor> {
        self.skills.values().map(|s| s.descriptor()).collect()
    }

    /// Execute a tool call, checking permissions first.
    ///
    /// Unknown skills are an `Err`; missing capabilities produce an error
    /// [`ToolResult`] so the calling agent can observe the denial.
    pub async fn execute(
        &self,
        call: ToolCall,
        permissions: &PermissionSet,
    ) -> WarroomResult<ToolResult> {
        let skill = self
            .skills
            .get(&call.name)
            .ok_or_else(|| WarroomError::Skill(format!("Unknown skill: {}", call.name)))?;

        for cap in &skill.descriptor().required_capabilities {
            if !permissions.has(cap) {
                warn!(
                    skill = %call.name,
                    capability = ?cap,
                    "Permission denied for skill execution"
                );
                return Ok(ToolResult::error(
                    &call.id,
                    format!(
                        "Permission denied: skill '{}' requires capability {:?}",
                        call.name, cap
                    ),
                ));
            }
        }

        skill.execute(call).await
    }

    /// Number of registered skills.
    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use warroom_security::Capability;

    struct EchoSkill {
        descriptor: SkillDescriptor,
    }

    impl EchoSkill {
        fn new(required: Vec<Capability>) -> Self {
            Self {
                descriptor: SkillDescriptor {
                    name: "echo".to_string(),
                    description: "Echo the input".to_string(),
                    parameters_schema: serde_json::json!({"type": "object"}),
                    required_capabilities: required,
                },
            }
        }
    }

    #[async_trait]
    impl Skill for EchoSkill {
        fn descriptor(&self) -> &SkillDescriptor {
            &self.descriptor
        }

        async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
            Ok(ToolResult::success(&call.id, call.arguments.to_string()))
        }
    }

    #[tokio::test]
    async fn test_execute_with_permission() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(EchoSkill::new(vec![Capability::WorkspaceRead])));

        let perms = PermissionSet::new().with(Capability::WorkspaceRead);
        let call = ToolCall::new("echo", serde_json::json!({"x": 1}));
        let result = registry.execute(call, &perms).await.unwrap();
        assert!(!result.is_error);
        assert!(result.content.contains("\"x\":1"));
    }

    #[tokio::test]
    async fn test_execute_denied_without_capability() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(EchoSkill::new(vec![Capability::WorkspaceWrite])));

        let call = ToolCall::new("echo", serde_json::json!({}));
        let result = registry.execute(call, &PermissionSet::new()).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_unknown_skill_is_an_error() {
        let registry = SkillRegistry::new();
        let call = ToolCall::new("missing", serde_json::json!({}));
        let err = registry.execute(call, &PermissionSet::all()).await.unwrap_err();
        assert!(matches!(err, WarroomError::Skill(_)));
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(EchoSkill::new(vec![])));
        registry.register(Arc::new(EchoSkill::new(vec![Capability::MarketApi])));
        assert_eq!(registry.skill_count(), 1);
        assert_eq!(
            registry.get("echo").unwrap().descriptor().required_capabilities,
            vec![Capability::MarketApi]
        );
    }
}
