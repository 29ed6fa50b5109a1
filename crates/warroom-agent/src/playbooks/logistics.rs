use super::{num_field, previous_json, str_field};
use crate::playbook::{AgentOutput, Playbook, Step, TurnContext};
use crate::request::ProcurementRequest;
use serde_json::{json, Value};
use warroom_core::WarroomResult;

/// Logistics specialist: spot-market offer, then the shipping quote.
pub struct LogisticsPlaybook {
    chip: String,
    origin: String,
    destination: String,
    offer: Option<Value>,
}

impl LogisticsPlaybook {
    /// Playbook for `request`.
    pub fn new(request: &ProcurementRequest) -> Self {
        Self {
            chip: request.chip.clone(),
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            offer: None,
        }
    }

    fn failed(&self, stage: &str, reason: String) -> Step {
        Step::Finish(AgentOutput::new(
            format!("Could not obtain the {stage}: {reason}"),
            json!({"chip": self.chip, "error": reason, "availability": 0}),
        ))
    }

    fn conclude(&self, offer: &Value, shipping: &Value) -> AgentOutput {
        let price = num_field(offer, "price");
        let availability = num_field(offer, "availability") as i64;
        let vendor = str_field(offer, "vendor");
        let currency = match str_field(offer, "currency") {
            "" => "USD",
            currency => currency,
        };
        let days = num_field(shipping, "days") as i64;
        let method = str_field(shipping, "method");
        let cost_per_unit = num_field(shipping, "cost_per_unit");

        let summary = if availability > 0 {
            format!(
                "Spot market: {availability} x {} available from {vendor} at {price:.2} {currency} per unit. \
                 Shipping {}-{}: {days} days via {method}, {cost_per_unit:.2} per unit.",
                self.chip, self.origin, self.destination
            )
        } else {
            let note = str_field(offer, "note");
            format!("Spot market has no {} stock. {note}", self.chip)
                .trim_end()
                .to_string()
        };

        AgentOutput::new(
            summary,
            json!({
                "chip": self.chip,
                "vendor": vendor,
                "unit_price": price,
                "currency": currency,
                "availability": availability,
                "route": format!("{}-{}", self.origin, self.destination),
                "shipping_days": days,
                "shipping_method": method,
                "shipping_cost_per_unit": cost_per_unit,
            }),
        )
    }
}

impl Playbook for LogisticsPlaybook {
    fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step> {
        if ctx.turn == 1 {
            return Ok(Step::call("fetch_spot_prices", json!({"chip_type": self.chip})));
        }

        let body = match previous_json(ctx) {
            Ok(body) => body,
            Err(reason) => {
                let stage = if self.offer.is_none() {
                    "spot price"
                } else {
                    "shipping estimate"
                };
                return Ok(self.failed(stage, reason));
            }
        };

        match self.offer.take() {
            None => {
                self.offer = Some(body);
                Ok(Step::call(
                    "estimate_shipping",
                    json!({"origin": self.origin, "destination": self.destination}),
                ))
            }
            Some(offer) => Ok(Step::Finish(self.conclude(&offer, &body))),
        }
    }
}
