use super::{executive_report_name, previous_text, PURCHASE_ORDER_FILE};
use crate::playbook::{AgentOutput, Playbook, Step, TurnContext};
use crate::request::ProcurementRequest;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;
use serde_json::json;
use warroom_core::WarroomResult;

const TAX_RATE: f64 = 0.0825;
const BUYER: [&str; 3] = [
    "Corporate Procurement Services",
    "123 Innovation Drive, Tech City, 94043",
    "procurement@example-corp.com",
];
const SHIP_TO: &str = "Central Warehouse, Receiving Dock, 456 Logistics Ave, Tech City, 94043";
const BILL_TO: &str = "Accounts Payable, 123 Innovation Drive, Tech City, 94043";
const PAYMENT_TERMS: &str = "Payment Terms: Net 30 Days";

/// `date` moved forward by `days` working days (weekends skipped).
pub fn add_business_days(date: NaiveDate, days: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = days;
    while remaining > 0 {
        current += Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    current
}

/// A purchase order derived from the executive report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseOrder {
    /// `PO-GPU-YYYYMMDD-001`.
    pub po_number: String,
    /// Date the order is placed.
    pub order_date: NaiveDate,
    /// Five business days after the order date.
    pub delivery_date: NaiveDate,
    /// Vendor SKU of the line item.
    pub sku: String,
    /// Line-item description.
    pub description: String,
    /// Units ordered.
    pub quantity: u32,
    /// Seller name.
    pub vendor: String,
    /// Price per unit.
    pub unit_price: f64,
    /// Currency of every amount.
    pub currency: String,
    /// Shipping and handling.
    pub shipping: f64,
}

impl PurchaseOrder {
    /// Extract the purchase details section of an executive report.
    pub fn from_report(
        report: &str,
        request: &ProcurementRequest,
        order_date: NaiveDate,
    ) -> Result<Self, String> {
        let field = |name: &str| {
            let prefix = format!("- {name}:");
            report
                .lines()
                .find_map(|line| line.trim().strip_prefix(prefix.as_str()))
                .map(str::trim)
        };
        let number = |name: &str| -> Result<f64, String> {
            let raw = field(name).ok_or_else(|| format!("report has no {name}"))?;
            raw.replace(',', "")
                .parse()
                .map_err(|_| format!("report {name} is not a number: {raw}"))
        };

        Ok(Self {
            po_number: format!("PO-GPU-{}-001", order_date.format("%Y%m%d")),
            order_date,
            delivery_date: add_business_days(order_date, 5),
            sku: request.vendor_sku.clone(),
            description: format!("NVIDIA {} PCIe GPU", request.chip),
            quantity: number("Quantity")?.max(0.0) as u32,
            vendor: field("Vendor").unwrap_or("[Seller name]").to_string(),
            unit_price: number("Unit Price")?,
            currency: field("Currency").unwrap_or("USD").to_string(),
            shipping: number("Shipping Cost").unwrap_or(0.0),
        })
    }

    /// Quantity times unit price.
    pub fn subtotal(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }

    /// Sales tax on the subtotal.
    pub fn tax(&self) -> f64 {
        round_cents(self.subtotal() * TAX_RATE)
    }

    /// Subtotal plus tax plus shipping.
    pub fn grand_total(&self) -> f64 {
        self.subtotal() + self.tax() + self.shipping
    }

    /// The purchase order document in Markdown.
    pub fn render(&self) -> String {
        let c = &self.currency;
        let mut doc = String::from("# PURCHASE ORDER\n\n");
        doc.push_str(&format!("**PO Number:** {}\n\n", self.po_number));
        doc.push_str(&format!("**Order Date:** {}\n", self.order_date));
        doc.push_str(&format!("**Expected Delivery Date:** {}\n\n", self.delivery_date));
        doc.push_str("## Buyer Information\n\n");
        doc.push_str(&format!("- Name: {}\n- Address: {}\n- Contact: {}\n\n", BUYER[0], BUYER[1], BUYER[2]));
        doc.push_str("## Seller Information\n\n");
        doc.push_str(&format!("- Name: {}\n- Address: [Seller address]\n- Contact: [Seller contact]\n\n", self.vendor));
        doc.push_str("## Shipping & Billing Details\n\n");
        doc.push_str(&format!("- **Ship To:** {SHIP_TO}\n- **Bill To:** {BILL_TO}\n\n"));
        doc.push_str("## Itemized Details\n\n");
        doc.push_str("| SKU | Description | Quantity | Unit Price | Line Total |\n");
        doc.push_str("|-----|-------------|----------|------------|------------|\n");
        doc.push_str(&format!(
            "| {} | {} | {} | {:.2} {c} | {:.2} {c} |\n\n",
            self.sku,
            self.description,
            self.quantity,
            self.unit_price,
            self.subtotal()
        ));
        doc.push_str("## Totals\n\n");
        doc.push_str(&format!("- **Subtotal:** {:.2} {c}\n", self.subtotal()));
        doc.push_str(&format!("- **Tax (8.25%):** {:.2} {c}\n", self.tax()));
        doc.push_str(&format!("- **Shipping & Handling:** {:.2} {c}\n", self.shipping));
        doc.push_str(&format!("- **Grand Total:** {:.2} {c}\n\n", self.grand_total()));
        doc.push_str("## Terms and Conditions\n\n");
        doc.push_str(PAYMENT_TERMS);
        doc.push('\n');
        doc
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ReadReport,
    Draft,
    Upload,
    Confirm,
}

/// Purchase-order specialist: report in, PO document out.
pub struct PurchaseOrderPlaybook {
    request: ProcurementRequest,
    report_name: String,
    stage: Stage,
    order: Option<PurchaseOrder>,
    document: String,
}

impl PurchaseOrderPlaybook {
    /// Playbook for `request`; the PO is dated `request.order_date`.
    pub fn new(request: &ProcurementRequest) -> Self {
        Self {
            request: request.clone(),
            report_name: executive_report_name(&request.chip),
            stage: Stage::ReadReport,
            order: None,
            document: String::new(),
        }
    }

    fn advance(&mut self, ctx: &TurnContext<'_>) -> Result<Step, String> {
        match self.stage {
            Stage::ReadReport => {
                self.stage = Stage::Draft;
                Ok(Step::call("read_file", json!({"filename": self.report_name})))
            }
            Stage::Draft => {
                let report = previous_text(ctx)?;
                let order = PurchaseOrder::from_report(report, &self.request, self.request.order_date)?;
                self.document = order.render();
                self.order = Some(order);
                self.stage = Stage::Upload;
                Ok(Step::call(
                    "write_file",
                    json!({"filename": PURCHASE_ORDER_FILE, "content": self.document}),
                ))
            }
            Stage::Upload => {
                previous_text(ctx)?;
                self.stage = Stage::Confirm;
                let po_number = self.order.as_ref().map(|o| o.po_number.as_str());
                Ok(Step::call(
                    "upload_report",
                    json!({
                        "filename": PURCHASE_ORDER_FILE,
                        "content": self.document,
                        "metadata": {"agent": "purchase_order_agent", "po_number": po_number},
                    }),
                ))
            }
            Stage::Confirm => {
                let receipt = previous_text(ctx)?;
                let order = self
                    .order
                    .as_ref()
                    .ok_or_else(|| "no purchase order was drafted".to_string())?;
                Ok(Step::Finish(AgentOutput::new(
                    format!(
                        "Purchase order {} for {} x {} from {} ({:.2} {} incl. tax and shipping) \
                         saved as {PURCHASE_ORDER_FILE}. {receipt}",
                        order.po_number,
                        order.quantity,
                        self.request.chip,
                        order.vendor,
                        order.grand_total(),
                        order.currency
                    ),
                    json!({"order": order, "file": PURCHASE_ORDER_FILE, "upload": receipt}),
                )))
            }
        }
    }
}

impl Playbook for PurchaseOrderPlaybook {
    fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step> {
        Ok(self.advance(ctx).unwrap_or_else(|reason| {
            Step::Finish(AgentOutput::new(
                format!("Purchase order not created: {reason}"),
                json!({"error": reason}),
            ))
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::playbooks::testing::{expect_call, failed, ok, step};
    use std::collections::HashMap;

    const REPORT: &str = "# Executive Report\n\n## Purchase details\n\n\
        - Quantity: 50\n- Vendor: FastChips_Reseller_LLC\n- Unit Price: 32000.00\n\
        - Currency: USD\n- Shipping Cost: 7500.00\n";

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 5).unwrap()
    }

    #[test]
    fn test_business_days_skip_weekend() {
        assert_eq!(
            add_business_days(friday(), 5),
            NaiveDate::from_ymd_opt(2025, 12, 12).unwrap()
        );
        let monday = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(add_business_days(monday, 4), friday());
    }

    #[test]
    fn test_order_from_report() {
        let order =
            PurchaseOrder::from_report(REPORT, &ProcurementRequest::default(), friday()).unwrap();
        assert_eq!(order.po_number, "PO-GPU-20251205-001");
        assert_eq!(order.quantity, 50);
        assert_eq!(order.subtotal(), 1_600_000.0);
        assert_eq!(order.tax(), 132_000.0);
        assert_eq!(order.grand_total(), 1_739_500.0);

        let doc = order.render();
        assert!(doc.contains("**Expected Delivery Date:** 2025-12-12"));
        assert!(doc.contains("| NV-H100-PCIE | NVIDIA H100 PCIe GPU | 50 | 32000.00 USD | 1600000.00 USD |"));
        assert!(doc.contains("Corporate Procurement Services"));
        assert!(doc.contains(SHIP_TO));
        assert!(doc.contains("- **Grand Total:** 1739500.00 USD"));
        assert!(doc.ends_with("Payment Terms: Net 30 Days\n"));
    }

    #[test]
    fn test_report_without_price_is_rejected() {
        let err = PurchaseOrder::from_report("- Quantity: 5\n", &ProcurementRequest::default(), friday())
            .unwrap_err();
        assert_eq!(err, "report has no Unit Price");
    }

    #[test]
    fn test_sequence() {
        let session = HashMap::new();
        let request = ProcurementRequest::default().with_order_date(friday());
        let mut playbook = PurchaseOrderPlaybook::new(&request);

        let (name, args) = expect_call(step(&mut playbook, 1, &session, None));
        assert_eq!(name, "read_file");
        assert_eq!(args["filename"], "Executive_Report_H100_Procurement.md");

        let (name, args) = expect_call(step(&mut playbook, 2, &session, ok(REPORT)));
        assert_eq!(name, "write_file");
        assert_eq!(args["filename"], "Purchase_Order.md");

        let (name, args) = expect_call(step(&mut playbook, 3, &session, ok("Success")));
        assert_eq!(name, "upload_report");
        assert_eq!(args["metadata"]["po_number"], "PO-GPU-20251205-001");

        let Step::Finish(output) = step(&mut playbook, 4, &session, ok("SUCCESS: Report uploaded (x)")) else {
            panic!("expected finish");
        };
        assert!(output.summary.starts_with("Purchase order PO-GPU-20251205-001 for 50 x H100"));
        assert_eq!(output.data["order"]["quantity"], 50);
    }

    #[test]
    fn test_missing_report() {
        let session = HashMap::new();
        let mut playbook = PurchaseOrderPlaybook::new(&ProcurementRequest::default());
        step(&mut playbook, 1, &session, None);
        let Step::Finish(output) = step(
            &mut playbook,
            2,
            &session,
            failed("File Executive_Report_H100_Procurement.md does not exist"),
        ) else {
            panic!("expected finish");
        };
        assert!(output.summary.starts_with("Purchase order not created"));
    }
}
