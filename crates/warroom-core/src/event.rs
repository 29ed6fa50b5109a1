use crate::tool::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one execution branch inside a merge.
///
/// The index is the branch's position in the collection handed to the merge
/// engine; the name is whatever the branch reports for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchId {
    /// Position of the branch in the merge's branch collection.
    pub index: usize,
    /// Diagnostic name (usually the agent name).
    pub name: String,
}

impl BranchId {
    /// Creates a new branch identity.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// Producer-defined payload of an [`Event`].
///
/// The merge engine never looks inside; only producers and the final
/// consumer interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventContent {
    /// Free-form text produced by an agent.
    Text {
        /// The text itself.
        text: String,
    },
    /// An agent decided to invoke a tool.
    ToolCall {
        /// The invocation request.
        call: ToolCall,
    },
    /// A tool invocation returned.
    ToolResult {
        /// The tool's response.
        result: ToolResult,
    },
    /// An agent published a value into the shared session state.
    StateDelta {
        /// State key (e.g. `inventory_agent_result`).
        key: String,
        /// The published value.
        value: serde_json::Value,
    },
}

impl EventContent {
    /// Shorthand for [`EventContent::Text`].
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the text if this is a [`EventContent::Text`] payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// One immutable unit of output produced by a branch.
///
/// Ownership moves from the branch to the merge engine to the consumer;
/// the type is deliberately not `Clone` so each event has exactly one owner.
#[derive(Debug, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    branch: BranchId,
    author: String,
    content: EventContent,
    is_terminal: bool,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates a new non-terminal event.
    pub fn new(branch: BranchId, author: impl Into<String>, content: EventContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            branch,
            author: author.into(),
            content,
            is_terminal: false,
            timestamp: Utc::now(),
        }
    }

    /// Marks the event as the final meaningful output of the run.
    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    /// Re-attributes the event to an enclosing branch, keeping its id, author,
    /// payload and timestamp. Used when a composite branch forwards the events
    /// of its children.
    pub fn reattributed(mut self, branch: BranchId) -> Self {
        self.branch = branch;
        self
    }

    /// Unique event identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The branch the event was delivered through.
    pub fn branch(&self) -> &BranchId {
        &self.branch
    }

    /// The agent (or producer) that authored the event.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// The payload.
    pub fn content(&self) -> &EventContent {
        &self.content
    }

    /// Consumes the event, returning its payload.
    pub fn into_content(self) -> EventContent {
        self.content
    }

    /// Whether this event is flagged as the final meaningful output.
    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    /// UTC timestamp of creation.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_defaults_to_non_terminal() {
        let event = Event::new(
            BranchId::new(0, "inventory_agent"),
            "inventory_agent",
            EventContent::text("searching"),
        );
        assert!(!event.is_terminal());
        assert_eq!(event.content().as_text(), Some("searching"));
        assert_eq!(event.branch().to_string(), "inventory_agent#0");
    }

    #[test]
    fn test_terminal_builder() {
        let event = Event::new(BranchId::new(1, "root"), "commander", EventContent::text("done"))
            .terminal();
        assert!(event.is_terminal());
        assert_eq!(event.author(), "commander");
    }

    #[test]
    fn test_reattributed_keeps_identity() {
        let event = Event::new(BranchId::new(3, "legal_agent"), "legal_agent", EventContent::text("x"));
        let id = event.id();
        let moved = event.reattributed(BranchId::new(0, "source_gpus_parallel_agent"));
        assert_eq!(moved.id(), id);
        assert_eq!(moved.author(), "legal_agent");
        assert_eq!(moved.branch().index, 0);
    }

    #[test]
    fn test_content_serialization_is_tagged() {
        let content = EventContent::StateDelta {
            key: "legal_agent_result".to_string(),
            value: serde_json::json!({"exclusivity": true}),
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "state_delta");
        let parsed: EventContent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, content);
    }
}
