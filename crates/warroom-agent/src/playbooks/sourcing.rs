use super::{
    executive_report_name, num_field, previous_json, previous_text, str_field, TRACKER_FILE,
    TRACKER_HEADER,
};
use crate::playbook::{AgentOutput, Playbook, Step, TurnContext};
use crate::profiles::{INVENTORY_RESULT, LEGAL_RESULT, LOGISTICS_RESULT};
use crate::request::ProcurementRequest;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{json, Value};
use warroom_core::WarroomResult;

/// How the requested quantity gets covered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcingPlan {
    /// Units requested.
    pub requested: u32,
    /// Internal units free to pick.
    pub available_units: u32,
    /// Internal units on quarantine or legal hold.
    pub held_units: u32,
    /// Internal units assigned to the request.
    pub internal_units: u32,
    /// Units bought on the spot market.
    pub spot_units: u32,
    /// Units nobody can supply.
    pub shortfall: u32,
    /// Whether the contract allows buying outside the contracted vendor.
    pub alternate_sourcing_allowed: bool,
    /// Spot-market vendor.
    pub vendor: String,
    /// Spot price per unit.
    pub unit_price: f64,
    /// Currency of every amount.
    pub currency: String,
    /// Spot units on offer.
    pub spot_availability: u32,
    /// Shipping route, e.g. `TW-US`.
    pub route: String,
    /// Shipping duration.
    pub shipping_days: i64,
    /// Shipping method.
    pub shipping_method: String,
    /// Shipping cost per unit.
    pub shipping_cost_per_unit: f64,
}

impl SourcingPlan {
    /// Combine the specialists' findings: internal stock first (held units
    /// included, pending release), then the spot market when the contract
    /// allows it.
    pub fn from_findings(
        requested: u32,
        inventory: Option<&Value>,
        legal: Option<&Value>,
        logistics: Option<&Value>,
    ) -> Self {
        let empty = Value::Null;
        let inventory = inventory.unwrap_or(&empty);
        let logistics = logistics.unwrap_or(&empty);
        let units = |v: &Value, key: &str| num_field(v, key).max(0.0) as u32;

        let available_units = units(inventory, "available_units");
        let held_units = units(inventory, "held_units");
        let alternate_sourcing_allowed = legal
            .and_then(|l| l.get("alternate_sourcing_allowed"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let spot_availability = units(logistics, "availability");

        let internal_units = (available_units + held_units).min(requested);
        let remaining = requested - internal_units;
        let spot_units = if alternate_sourcing_allowed {
            remaining.min(spot_availability)
        } else {
            0
        };

        Self {
            requested,
            available_units,
            held_units,
            internal_units,
            spot_units,
            shortfall: remaining - spot_units,
            alternate_sourcing_allowed,
            vendor: str_field(logistics, "vendor").to_string(),
            unit_price: num_field(logistics, "unit_price"),
            currency: match str_field(logistics, "currency") {
                "" => "USD".to_string(),
                c => c.to_string(),
            },
            spot_availability,
            route: str_field(logistics, "route").to_string(),
            shipping_days: num_field(logistics, "shipping_days") as i64,
            shipping_method: str_field(logistics, "shipping_method").to_string(),
            shipping_cost_per_unit: num_field(logistics, "shipping_cost_per_unit"),
        }
    }

    /// Cost of the spot-market units.
    pub fn spot_cost(&self) -> f64 {
        f64::from(self.spot_units) * self.unit_price
    }

    /// Shipping cost of the spot-market units.
    pub fn shipping_cost(&self) -> f64 {
        f64::from(self.spot_units) * self.shipping_cost_per_unit
    }

    /// The plan in one plain sentence.
    pub fn headline(&self) -> String {
        let mut line = format!(
            "You requested {} GPUs; I found {} in our warehouse",
            self.requested, self.internal_units
        );
        if self.spot_units > 0 {
            line.push_str(&format!(
                " plus the best available deal on {} additional GPUs for ${:.1}K from {}",
                self.spot_units,
                self.spot_cost() / 1000.0,
                self.vendor
            ));
        }
        if self.shortfall > 0 {
            line.push_str(&format!(", leaving {} units uncovered", self.shortfall));
        }
        line.push('.');
        line
    }

    /// Tracker rows recording the three findings.
    pub fn tracker_rows(&self, timestamp: &str) -> Vec<String> {
        let internal_status = if self.held_units > 0 {
            "HOLD_LEGAL"
        } else {
            "AVAILABLE"
        };
        let (legal_status, legal_note) = if self.alternate_sourcing_allowed {
            ("CLEARED", "exclusivity voided by force majeure; alternate vendors permitted")
        } else {
            ("BLOCKED", "exclusivity in force; spot purchases not permitted")
        };
        let spot_status = if self.spot_availability > 0 {
            "QUOTED"
        } else {
            "UNAVAILABLE"
        };
        vec![
            format!(
                "{timestamp}, internal_inventory, {}, {internal_status}, {} available; {} on legal hold",
                self.available_units + self.held_units,
                self.available_units,
                self.held_units
            ),
            format!("{timestamp}, legal_review, 0, {legal_status}, {legal_note}"),
            format!(
                "{timestamp}, spot_market:{}, {}, {spot_status}, {:.2} {}/unit; {} days via {}",
                or_unknown(&self.vendor),
                self.spot_units,
                self.unit_price,
                self.currency,
                self.shipping_days,
                or_unknown(&self.shipping_method)
            ),
        ]
    }

    /// The executive report in Markdown.
    pub fn render_report(&self, chip: &str, legal_summary: &str, tracker: &str) -> String {
        let mut report = format!("# Executive Report: {chip} Procurement\n\n");
        report.push_str(&format!("**Request:** {} x {chip}\n\n", self.requested));
        report.push_str("## Bottom line\n\n");
        report.push_str(&self.headline());
        report.push_str("\n\n## How the numbers add up\n\n");
        report.push_str(&format!(
            "- Internal stock: {} available for pick + {} on legal hold (release requires override authorization) = {} units.\n",
            self.available_units,
            self.held_units,
            self.available_units + self.held_units
        ));
        report.push_str(&format!(
            "- Remaining need: {} - {} = {} units.\n",
            self.requested,
            self.internal_units,
            self.requested - self.internal_units
        ));
        report.push_str(&format!(
            "- Spot market: {} of {} available at {:.2} {} = {:.2} {}.\n",
            self.spot_units,
            self.spot_availability,
            self.unit_price,
            self.currency,
            self.spot_cost(),
            self.currency
        ));
        report.push_str(&format!(
            "- Shipping: {} x {:.2} {} = {:.2} {}, {} days via {} ({}).\n",
            self.spot_units,
            self.shipping_cost_per_unit,
            self.currency,
            self.shipping_cost(),
            self.currency,
            self.shipping_days,
            or_unknown(&self.shipping_method),
            or_unknown(&self.route)
        ));
        report.push_str(&format!("- Shortfall: {} units.\n\n", self.shortfall));
        report.push_str("## Legal position\n\n");
        report.push_str(legal_summary);
        report.push_str("\n\n## Purchase details\n\n");
        report.push_str(&format!("- Quantity: {}\n", self.spot_units));
        report.push_str(&format!("- Vendor: {}\n", or_unknown(&self.vendor)));
        report.push_str(&format!("- Unit Price: {:.2}\n", self.unit_price));
        report.push_str(&format!("- Currency: {}\n", self.currency));
        report.push_str(&format!("- Shipping Cost: {:.2}\n", self.shipping_cost()));
        report.push_str("\n## Procurement tracker\n\n```csv\n");
        report.push_str(tracker.trim_end());
        report.push_str("\n```\n");
        report
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    CheckTracker,
    InitTracker,
    Record(usize),
    WriteReport,
    Upload,
    Summarize,
}

/// Sourcing consolidation: tracker, executive report, upload.
pub struct SourcingPlaybook {
    chip: String,
    quantity: u32,
    report_name: String,
    stage: Stage,
    plan: Option<SourcingPlan>,
    rows: Vec<String>,
    legal_summary: String,
    report: String,
}

impl SourcingPlaybook {
    /// Playbook for `request`.
    pub fn new(request: &ProcurementRequest) -> Self {
        Self {
            chip: request.chip.clone(),
            quantity: request.quantity,
            report_name: executive_report_name(&request.chip),
            stage: Stage::CheckTracker,
            plan: None,
            rows: Vec::new(),
            legal_summary: String::new(),
            report: String::new(),
        }
    }

    fn append(&self, index: usize) -> Step {
        match self.rows.get(index) {
            Some(row) => Step::call(
                "append_to_log",
                json!({"filename": TRACKER_FILE, "content": row}),
            ),
            None => Step::call("read_file", json!({"filename": TRACKER_FILE})),
        }
    }

    fn after_append(index: usize, rows: usize) -> Stage {
        if index < rows {
            Stage::Record(index + 1)
        } else {
            Stage::WriteReport
        }
    }

    fn advance(&mut self, ctx: &TurnContext<'_>, plan: &SourcingPlan) -> Result<Step, String> {
        match self.stage {
            Stage::CheckTracker => {
                self.stage = Stage::InitTracker;
                Ok(Step::call("list_files", json!({})))
            }
            Stage::InitTracker => {
                let files = previous_json(ctx)?;
                let exists = files
                    .as_array()
                    .is_some_and(|f| f.iter().any(|n| n.as_str() == Some(TRACKER_FILE)));
                if exists {
                    self.stage = Self::after_append(0, self.rows.len());
                    Ok(self.append(0))
                } else {
                    self.stage = Stage::Record(0);
                    Ok(Step::call(
                        "write_file",
                        json!({"filename": TRACKER_FILE, "content": format!("{TRACKER_HEADER}\n")}),
                    ))
                }
            }
            Stage::Record(index) => {
                previous_text(ctx)?;
                self.stage = Self::after_append(index, self.rows.len());
                Ok(self.append(index))
            }
            Stage::WriteReport => {
                let tracker = previous_text(ctx)?;
                self.report = plan.render_report(&self.chip, &self.legal_summary, tracker);
                self.stage = Stage::Upload;
                Ok(Step::call(
                    "write_file",
                    json!({"filename": self.report_name, "content": self.report}),
                ))
            }
            Stage::Upload => {
                previous_text(ctx)?;
                self.stage = Stage::Summarize;
                Ok(Step::call(
                    "upload_report",
                    json!({
                        "filename": self.report_name,
                        "content": self.report,
                        "metadata": {
                            "agent": "source_gpus_merge_agent",
                            "chip": self.chip,
                            "requested": self.quantity,
                        },
                    }),
                ))
            }
            Stage::Summarize => {
                let receipt = previous_text(ctx)?;
                Ok(Step::Finish(AgentOutput::new(
                    format!(
                        "{} Executive report {}: {receipt}",
                        plan.headline(),
                        self.report_name
                    ),
                    json!({
                        "plan": plan,
                        "report": self.report_name,
                        "tracker": TRACKER_FILE,
                        "upload": receipt,
                    }),
                )))
            }
        }
    }
}

impl Playbook for SourcingPlaybook {
    fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step> {
        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => {
                let plan = SourcingPlan::from_findings(
                    self.quantity,
                    ctx.findings(INVENTORY_RESULT),
                    ctx.findings(LEGAL_RESULT),
                    ctx.findings(LOGISTICS_RESULT),
                );
                let timestamp = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                self.rows = plan.tracker_rows(&timestamp);
                self.legal_summary = ctx
                    .summary(LEGAL_RESULT)
                    .unwrap_or("No legal findings were provided.")
                    .to_string();
                plan
            }
        };

        let step = self.advance(ctx, &plan).unwrap_or_else(|reason| {
            Step::Finish(AgentOutput::new(
                format!("{} Consolidation stopped: {reason}", plan.headline()),
                json!({"plan": plan, "error": reason}),
            ))
        });
        self.plan = Some(plan);
        Ok(step)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::playbooks::testing::{expect_call, failed, ok, step};
    use std::collections::HashMap;

    fn findings() -> HashMap<String, Value> {
        let mut session = HashMap::new();
        session.insert(
            INVENTORY_RESULT.to_string(),
            json!({"summary": "inv", "data": {"available_units": 0, "held_units": 950}}),
        );
        session.insert(
            LEGAL_RESULT.to_string(),
            json!({"summary": "Alternate vendors are permitted.", "data": {"alternate_sourcing_allowed": true}}),
        );
        session.insert(
            LOGISTICS_RESULT.to_string(),
            json!({"summary": "spot", "data": {
                "vendor": "FastChips_Reseller_LLC", "unit_price": 32000.0, "currency": "USD",
                "availability": 250, "route": "TW-US", "shipping_days": 14,
                "shipping_method": "AIR_FREIGHT_RUSH", "shipping_cost_per_unit": 150.0
            }}),
        );
        session
    }

    #[test]
    fn test_plan_covers_request() {
        let session = findings();
        let plan = SourcingPlan::from_findings(
            1000,
            session[INVENTORY_RESULT].get("data"),
            session[LEGAL_RESULT].get("data"),
            session[LOGISTICS_RESULT].get("data"),
        );
        assert_eq!(plan.internal_units, 950);
        assert_eq!(plan.spot_units, 50);
        assert_eq!(plan.shortfall, 0);
        assert_eq!(plan.spot_cost(), 1_600_000.0);
        assert_eq!(plan.shipping_cost(), 7_500.0);
        assert_eq!(
            plan.headline(),
            "You requested 1000 GPUs; I found 950 in our warehouse plus the best available \
             deal on 50 additional GPUs for $1600.0K from FastChips_Reseller_LLC."
        );
    }

    #[test]
    fn test_blocked_contract_leaves_shortfall() {
        let plan = SourcingPlan::from_findings(
            1000,
            Some(&json!({"available_units": 0, "held_units": 950})),
            Some(&json!({"alternate_sourcing_allowed": false})),
            Some(&json!({"availability": 250, "unit_price": 32000.0})),
        );
        assert_eq!(plan.spot_units, 0);
        assert_eq!(plan.shortfall, 50);
        assert!(plan.headline().ends_with("leaving 50 units uncovered."));
    }

    #[test]
    fn test_tracker_rows_have_five_columns() {
        let plan = SourcingPlan::from_findings(10, None, None, None);
        for row in plan.tracker_rows("2025-01-01T00:00:00Z") {
            assert_eq!(row.split(", ").count(), TRACKER_HEADER.split(", ").count(), "{row}");
        }
    }

    #[test]
    fn test_full_sequence() {
        let session = findings();
        let mut playbook = SourcingPlaybook::new(&ProcurementRequest::default());

        let (name, _) = expect_call(step(&mut playbook, 1, &session, None));
        assert_eq!(name, "list_files");

        let (name, args) = expect_call(step(&mut playbook, 2, &session, ok("[]")));
        assert_eq!(name, "write_file");
        assert_eq!(args["content"], "timestamp, source, quantity, status, notes\n");

        for turn in 3..6 {
            let (name, args) = expect_call(step(&mut playbook, turn, &session, ok("Success")));
            assert_eq!(name, "append_to_log");
            assert_eq!(args["filename"], TRACKER_FILE);
        }

        let (name, _) = expect_call(step(&mut playbook, 6, &session, ok("Success")));
        assert_eq!(name, "read_file");

        let (name, args) = expect_call(step(
            &mut playbook,
            7,
            &session,
            ok("timestamp, source, quantity, status, notes\nrow"),
        ));
        assert_eq!(name, "write_file");
        assert_eq!(args["filename"], "Executive_Report_H100_Procurement.md");
        let report = args["content"].as_str().unwrap();
        assert!(report.contains("- Quantity: 50\n"));
        assert!(report.contains("- Vendor: FastChips_Reseller_LLC\n"));
        assert!(report.contains("Alternate vendors are permitted."));

        let (name, args) = expect_call(step(&mut playbook, 8, &session, ok("Success")));
        assert_eq!(name, "upload_report");
        assert_eq!(args["metadata"]["requested"], 1000);

        let Step::Finish(output) = step(
            &mut playbook,
            9,
            &session,
            ok("SUCCESS: Report uploaded (http://sink/r/1)"),
        ) else {
            panic!("expected finish");
        };
        assert!(output.summary.ends_with("SUCCESS: Report uploaded (http://sink/r/1)"));
        assert_eq!(output.data["plan"]["spot_units"], 50);
    }

    #[test]
    fn test_existing_tracker_skips_header() {
        let session = findings();
        let mut playbook = SourcingPlaybook::new(&ProcurementRequest::default());
        step(&mut playbook, 1, &session, None);
        let (name, _) = expect_call(step(
            &mut playbook,
            2,
            &session,
            ok(r#"["procurement_tracker.csv"]"#),
        ));
        assert_eq!(name, "append_to_log");
    }

    #[test]
    fn test_write_failure_stops_consolidation() {
        let session = findings();
        let mut playbook = SourcingPlaybook::new(&ProcurementRequest::default());
        step(&mut playbook, 1, &session, None);
        step(&mut playbook, 2, &session, ok("[]"));
        let Step::Finish(output) = step(&mut playbook, 3, &session, failed("disk full")) else {
            panic!("expected finish");
        };
        assert!(output.summary.ends_with("Consolidation stopped: disk full"));
    }
}
