use serde_json::Value;
use std::collections::HashMap;
use warroom_core::{ToolCall, ToolResult, WarroomResult};

/// What an agent does next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Invoke a tool and observe its result on the next turn.
    Call(ToolCall),
    /// Stop and publish the agent's output.
    Finish(AgentOutput),
}

impl Step {
    /// Shorthand for a [`Step::Call`] with a fresh call id.
    pub fn call(name: &str, arguments: Value) -> Self {
        Self::Call(ToolCall::new(name, arguments))
    }
}

/// The published result of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    /// Human-readable answer, emitted as the agent's final text.
    pub summary: String,
    /// Structured findings later agents read.
    pub data: Value,
}

impl AgentOutput {
    /// Output with structured `data`.
    pub fn new(summary: impl Into<String>, data: Value) -> Self {
        Self {
            summary: summary.into(),
            data,
        }
    }

    /// The value stored in the session state.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "summary": self.summary, "data": self.data })
    }
}

/// Everything a playbook may look at when choosing its next step.
pub struct TurnContext<'a> {
    /// 1-based turn number.
    pub turn: u32,
    /// Session state as of the start of this turn.
    pub session: &'a HashMap<String, Value>,
    /// Result of the tool called on the previous turn, if any.
    pub last_result: Option<&'a ToolResult>,
}

impl TurnContext<'_> {
    /// The `data` object another agent published under `key`.
    pub fn findings(&self, key: &str) -> Option<&Value> {
        self.session.get(key).and_then(|v| v.get("data"))
    }

    /// The `summary` another agent published under `key`.
    pub fn summary(&self, key: &str) -> Option<&str> {
        self.session
            .get(key)
            .and_then(|v| v.get("summary"))
            .and_then(Value::as_str)
    }
}

/// A deterministic plan standing in for model reasoning.
///
/// The runner asks for one step per turn and feeds back the previous tool
/// result. An `Err` aborts the agent.
pub trait Playbook: Send {
    /// Choose the next step.
    fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step>;
}
