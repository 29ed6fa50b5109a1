use super::previous_json;
use crate::playbook::{AgentOutput, Playbook, Step, TurnContext};
use crate::profiles::{PURCHASE_ORDER_RESULT, SOURCING_RESULT};
use serde_json::{json, Value};
use warroom_core::WarroomResult;

/// Incident commander: checks which documents exist, then reports back.
#[derive(Debug, Default)]
pub struct CommanderPlaybook;

impl CommanderPlaybook {
    /// New commander.
    pub fn new() -> Self {
        Self
    }
}

impl Playbook for CommanderPlaybook {
    fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step> {
        if ctx.turn == 1 {
            return Ok(Step::call("list_files", json!({})));
        }

        let files: Vec<String> = previous_json(ctx)
            .ok()
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let sourcing = ctx
            .summary(SOURCING_RESULT)
            .unwrap_or("The sourcing team did not report back.");
        let purchase_order = ctx
            .summary(PURCHASE_ORDER_RESULT)
            .unwrap_or("No purchase order was produced.");
        let location = if files.is_empty() {
            "No documents were written to the workspace.".to_string()
        } else {
            format!("Workspace documents: {}.", files.join(", "))
        };

        Ok(Step::Finish(AgentOutput::new(
            format!("{sourcing}\n{purchase_order}\n{location}"),
            json!({"documents": files}),
        )))
    }
}
