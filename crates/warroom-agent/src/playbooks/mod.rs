//! The specialists of the crisis pipeline.
//!
//! Each playbook is a small state machine: it inspects the previous tool
//! result, records what it learned and picks the next tool call. A failed
//! tool call doesn't abort the agent; it finishes early and reports what it
//! could not find, so the rest of the pipeline can carry on.

mod commander;
mod inventory;
mod legal;
mod logistics;
mod purchase_order;
mod sourcing;

pub use commander::CommanderPlaybook;
pub use inventory::InventoryPlaybook;
pub use legal::LegalPlaybook;
pub use logistics::LogisticsPlaybook;
pub use purchase_order::{add_business_days, PurchaseOrder, PurchaseOrderPlaybook};
pub use sourcing::{SourcingPlan, SourcingPlaybook};

use crate::playbook::TurnContext;
use serde_json::Value;

/// Tracker maintained by the sourcing agent.
pub const TRACKER_FILE: &str = "procurement_tracker.csv";
/// Header row of [`TRACKER_FILE`].
pub const TRACKER_HEADER: &str = "timestamp, source, quantity, status, notes";

/// File name of the executive report for `chip`.
pub fn executive_report_name(chip: &str) -> String {
    format!("Executive_Report_{chip}_Procurement.md")
}

/// File name of the purchase order.
pub const PURCHASE_ORDER_FILE: &str = "Purchase_Order.md";

/// JSON body of the previous tool result, or the reason there is none.
pub(crate) fn previous_json(ctx: &TurnContext<'_>) -> Result<Value, String> {
    let text = previous_text(ctx)?;
    serde_json::from_str(text).map_err(|_| format!("unreadable tool result: {text}"))
}

/// Text of the previous tool result, or the error it reported.
pub(crate) fn previous_text<'a>(ctx: &TurnContext<'a>) -> Result<&'a str, String> {
    match ctx.last_result {
        Some(result) if result.is_error => Err(result.content.clone()),
        Some(result) => Ok(result.content.as_str()),
        None => Err("no tool result to read".to_string()),
    }
}

/// Integer field of a JSON row, tolerating numbers stored as text.
pub(crate) fn int_field(row: &Value, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Float field of a JSON object.
pub(crate) fn num_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// String field of a JSON object, empty when missing.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}
