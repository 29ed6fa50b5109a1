use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warroom_core::{WarroomResult, ToolCall, ToolResult};
use warroom_security::Capability;

/// Metadata describing a skill's interface and required permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Tool name agents use to call the skill.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters_schema: serde_json::Value,
    /// Capabilities the caller must hold.
    pub required_capabilities: Vec<Capability>,
}

/// Trait that all skills implement.
#[async_trait]
pub trait Skill: Send + Sync {
    /// The skill's descriptor.
    fn descriptor(&self) -> &SkillDescriptor;

    /// Execute a call. Recoverable failures are reported as
    /// [`ToolResult::error`]; `Err` is reserved for broken invariants.
    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult>;
}
