use super::{int_field, previous_json, str_field};
use crate::playbook::{AgentOutput, Playbook, Step, TurnContext};
use crate::request::ProcurementRequest;
use serde_json::{json, Value};
use warroom_core::WarroomResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ExploreCatalog,
    LookupSku,
    ExploreInventory,
    QueryStock,
    Summarize,
}

/// Inventory specialist.
///
/// The legacy inventory table doesn't know vendor SKUs, so the lookup goes
/// through the catalog first (SKU → `ITEM_REF_ID`), then reads every bin for
/// that reference, including the quarantine and hold bins a plain
/// "available stock" query would miss.
pub struct InventoryPlaybook {
    sku: String,
    catalog_table: String,
    inventory_table: String,
    stage: Stage,
    catalog_id: String,
    ref_id: String,
}

impl InventoryPlaybook {
    /// Playbook for `request`.
    pub fn new(request: &ProcurementRequest) -> Self {
        Self {
            sku: request.vendor_sku.clone(),
            catalog_table: request.catalog_table.clone(),
            inventory_table: request.inventory_table.clone(),
            stage: Stage::ExploreCatalog,
            catalog_id: String::new(),
            ref_id: String::new(),
        }
    }

    fn advance(&mut self, ctx: &TurnContext<'_>) -> Result<Step, String> {
        match self.stage {
            Stage::ExploreCatalog => {
                self.stage = Stage::LookupSku;
                Ok(Step::call(
                    "explore_schema",
                    json!({"table_name": self.catalog_table}),
                ))
            }
            Stage::LookupSku => {
                let schema = previous_json(ctx)?;
                self.catalog_id = qualified_id(&schema)?;
                self.stage = Stage::ExploreInventory;
                Ok(Step::call(
                    "run_query",
                    json!({"sql_query": format!(
                        "SELECT ITEM_REF_ID, ITEM_DESC FROM {} WHERE VENDOR_SKU = '{}'",
                        self.catalog_id,
                        escape(&self.sku)
                    )}),
                ))
            }
            Stage::ExploreInventory => {
                let rows = previous_json(ctx)?;
                let Some(ref_id) = rows
                    .get(0)
                    .map(|row| str_field(row, "ITEM_REF_ID"))
                    .filter(|id| !id.is_empty())
                else {
                    return Ok(Step::Finish(AgentOutput::new(
                        format!("No catalog entry maps vendor SKU {} to an internal reference.", self.sku),
                        json!({"sku": self.sku, "available_units": 0, "held_units": 0, "bins": []}),
                    )));
                };
                self.ref_id = ref_id.to_string();
                self.stage = Stage::QueryStock;
                Ok(Step::call(
                    "explore_schema",
                    json!({"table_name": self.inventory_table}),
                ))
            }
            Stage::QueryStock => {
                let schema = previous_json(ctx)?;
                let inventory_id = qualified_id(&schema)?;
                self.stage = Stage::Summarize;
                Ok(Step::call(
                    "run_query",
                    json!({"sql_query": format!(
                        "SELECT LOC_ID, BIN_CD, QTY_OH, STAT_CD, HOLD_RSN FROM {inventory_id} \
                         WHERE ITEM_REF_ID = '{}' ORDER BY LOC_ID, BIN_CD",
                        escape(&self.ref_id)
                    )}),
                ))
            }
            Stage::Summarize => {
                let rows = previous_json(ctx)?;
                Ok(Step::Finish(self.summarize(&rows)))
            }
        }
    }

    fn summarize(&self, rows: &Value) -> AgentOutput {
        let rows = rows.as_array().cloned().unwrap_or_default();
        let mut available = 0;
        let mut held = 0;
        let mut reserved = 0;
        let mut held_locations = Vec::new();
        for row in &rows {
            let qty = int_field(row, "QTY_OH");
            let bin = str_field(row, "BIN_CD");
            match int_field(row, "STAT_CD") {
                _ if bin == "QUARANTINE" || bin == "HOLD" => {
                    held += qty;
                    if qty > 0 {
                        held_locations.push(format!("{qty} in {bin} at {}", str_field(row, "LOC_ID")));
                    }
                }
                9 => held += qty,
                0 => available += qty,
                _ => reserved += qty,
            }
        }

        let mut summary = format!(
            "{} ({}): {available} units available for pick, {held} units on legal hold",
            self.sku, self.ref_id
        );
        if !held_locations.is_empty() {
            summary.push_str(&format!(" ({})", held_locations.join(", ")));
        }
        summary.push('.');
        if held > 0 {
            summary.push_str(" Held units are physically present; release requires override authorization.");
        }

        AgentOutput::new(
            summary,
            json!({
                "sku": self.sku,
                "item_ref_id": self.ref_id,
                "available_units": available,
                "held_units": held,
                "reserved_units": reserved,
                "bins": rows,
            }),
        )
    }
}

impl Playbook for InventoryPlaybook {
    fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step> {
        Ok(self.advance(ctx).unwrap_or_else(|reason| {
            Step::Finish(AgentOutput::new(
                format!("Inventory lookup failed: {reason}"),
                json!({"sku": self.sku, "error": reason, "available_units": 0, "held_units": 0}),
            ))
        }))
    }
}

fn qualified_id(schema: &Value) -> Result<String, String> {
    if let Some(error) = schema.get("error").and_then(Value::as_str) {
        return Err(error.to_string());
    }
    let id = str_field(schema, "fully_qualified_id");
    if id.is_empty() {
        return Err("schema lookup returned no table id".to_string());
    }
    Ok(id.to_string())
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::playbooks::testing::{expect_call, failed, ok, step};
    use std::collections::HashMap;

    #[test]
    fn test_catalog_then_inventory() {
        let session = HashMap::new();
        let mut playbook = InventoryPlaybook::new(&ProcurementRequest::default());

        let (name, args) = expect_call(step(&mut playbook, 1, &session, None));
        assert_eq!(name, "explore_schema");
        assert_eq!(args["table_name"], "REF_CATALOG_DUMP");

        let (name, args) = expect_call(step(
            &mut playbook,
            2,
            &session,
            ok(r#"{"fully_qualified_id": "db.REF_CATALOG_DUMP"}"#),
        ));
        assert_eq!(name, "run_query");
        assert!(args["sql_query"]
            .as_str()
            .unwrap()
            .contains("FROM db.REF_CATALOG_DUMP WHERE VENDOR_SKU = 'NV-H100-PCIE'"));

        let (_, args) = expect_call(step(
            &mut playbook,
            3,
            &session,
            ok(r#"[{"ITEM_REF_ID": "REF_GPU_H100_PCIE_80G"}]"#),
        ));
        assert_eq!(args["table_name"], "LEGACY_INV_MAIN_V2");

        let (_, args) = expect_call(step(
            &mut playbook,
            4,
            &session,
            ok(r#"{"fully_qualified_id": "db.LEGACY_INV_MAIN_V2"}"#),
        ));
        assert!(args["sql_query"]
            .as_str()
            .unwrap()
            .contains("ITEM_REF_ID = 'REF_GPU_H100_PCIE_80G'"));

        let rows = r#"[
            {"LOC_ID": "WH-AUS-02", "BIN_CD": "HOLD", "QTY_OH": 150, "STAT_CD": 9},
            {"LOC_ID": "WH-SJC-01", "BIN_CD": "A-12-03", "QTY_OH": 0, "STAT_CD": 0},
            {"LOC_ID": "WH-SJC-01", "BIN_CD": "QUARANTINE", "QTY_OH": 800, "STAT_CD": 9}
        ]"#;
        let Step::Finish(output) = step(&mut playbook, 5, &session, ok(rows)) else {
            panic!("expected finish");
        };
        assert_eq!(output.data["held_units"], 950);
        assert_eq!(output.data["available_units"], 0);
        assert!(output.summary.contains("800 in QUARANTINE at WH-SJC-01"));
    }

    #[test]
    fn test_unknown_sku_finishes_empty() {
        let session = HashMap::new();
        let mut playbook = InventoryPlaybook::new(&ProcurementRequest::new("B300", 10));
        step(&mut playbook, 1, &session, None);
        step(&mut playbook, 2, &session, ok(r#"{"fully_qualified_id": "db.C"}"#));
        let Step::Finish(output) = step(&mut playbook, 3, &session, ok("[]")) else {
            panic!("expected finish");
        };
        assert!(output.summary.starts_with("No catalog entry"));
        assert_eq!(output.data["held_units"], 0);
    }

    #[test]
    fn test_tool_error_finishes_with_reason() {
        let session = HashMap::new();
        let mut playbook = InventoryPlaybook::new(&ProcurementRequest::default());
        step(&mut playbook, 1, &session, None);
        let Step::Finish(output) = step(&mut playbook, 2, &session, failed("Permission denied")) else {
            panic!("expected finish");
        };
        assert_eq!(output.summary, "Inventory lookup failed: Permission denied");
        assert_eq!(output.data["error"], "Permission denied");
    }
}
