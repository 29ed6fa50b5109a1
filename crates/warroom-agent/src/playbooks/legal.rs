use super::previous_text;
use crate::playbook::{AgentOutput, Playbook, Step, TurnContext};
use crate::request::ProcurementRequest;
use serde_json::json;
use warroom_core::WarroomResult;

/// Clauses reviewed, in order.
const CLAUSES: [&str; 2] = ["Exclusivity", "Force Majeure"];

/// Legal specialist: checks whether buying outside the contracted vendor is
/// allowed, reading the exclusivity clause and then its exceptions.
pub struct LegalPlaybook {
    contract: String,
    findings: Vec<(String, String)>,
}

impl LegalPlaybook {
    /// Playbook for `request`.
    pub fn new(request: &ProcurementRequest) -> Self {
        Self {
            contract: request.contract.clone(),
            findings: Vec::new(),
        }
    }

    fn ask(&self, clause: &str) -> Step {
        Step::call(
            "analyze_contract_clause",
            json!({"doc_name": self.contract, "clause_type": clause}),
        )
    }

    fn conclude(&self) -> AgentOutput {
        let text_of = |clause: &str| {
            self.findings
                .iter()
                .find(|(name, _)| name == clause)
                .map(|(_, text)| text.as_str())
                .unwrap_or("")
        };
        let exclusivity = text_of("Exclusivity");
        let exception = text_of("Force Majeure");

        let exclusive = exclusivity.contains("Restriction");
        let exception_applies = exception.contains("Permission") || exception.contains("alternate vendors");
        let alternate_sourcing_allowed = !exclusive || exception_applies;

        let summary = match (exclusive, exception_applies) {
            (true, true) => format!(
                "{} restricts purchases to the contracted vendor, but the Force Majeure exception \
                 voids exclusivity after prolonged non-delivery; alternate vendors are permitted.",
                self.contract
            ),
            (true, false) => format!(
                "{} restricts purchases to the contracted vendor and no exception applies; \
                 spot-market purchases would be a breach.",
                self.contract
            ),
            (false, _) => format!(
                "{} imposes no exclusivity restriction; alternate vendors are permitted.",
                self.contract
            ),
        };

        AgentOutput::new(
            summary,
            json!({
                "contract": self.contract,
                "exclusivity": exclusivity,
                "force_majeure": exception,
                "alternate_sourcing_allowed": alternate_sourcing_allowed,
            }),
        )
    }
}

impl Playbook for LegalPlaybook {
    fn next_step(&mut self, ctx: &TurnContext<'_>) -> WarroomResult<Step> {
        if let Some(clause) = CLAUSES.get(self.findings.len()).filter(|_| ctx.turn > 1) {
            match previous_text(ctx) {
                Ok(text) => self.findings.push((clause.to_string(), text.to_string())),
                Err(reason) => {
                    return Ok(Step::Finish(AgentOutput::new(
                        format!("Contract review failed on the {clause} clause: {reason}"),
                        json!({
                            "contract": self.contract,
                            "error": reason,
                            "alternate_sourcing_allowed": false,
                        }),
                    )));
                }
            }
        }

        match CLAUSES.get(self.findings.len()) {
            Some(clause) => Ok(self.ask(clause)),
            None => Ok(Step::Finish(self.conclude())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::playbooks::testing::{expect_call, failed, ok, step};
    use std::collections::HashMap;

    #[test]
    fn test_exception_permits_alternate_vendors() {
        let session = HashMap::new();
        let mut playbook = LegalPlaybook::new(&ProcurementRequest::default());

        let (_, args) = expect_call(step(&mut playbook, 1, &session, None));
        assert_eq!(args["clause_type"], "Exclusivity");
        assert_eq!(args["doc_name"], "Master_Supply_Agreement_NVIDIA.pdf");

        let (_, args) = expect_call(step(
            &mut playbook,
            2,
            &session,
            ok("Clause 2 (EXCLUSIVITY) ...\nInterpretation:\n- Restriction: purchases outside the named vendor are a breach of contract."),
        ));
        assert_eq!(args["clause_type"], "Force Majeure");

        let Step::Finish(output) = step(
            &mut playbook,
            3,
            &session,
            ok("Clause 7.B ...\nInterpretation:\n- Permission: the buyer may source from alternate vendors."),
        ) else {
            panic!("expected finish");
        };
        assert_eq!(output.data["alternate_sourcing_allowed"], true);
        assert!(output.summary.contains("alternate vendors are permitted"));
    }

    #[test]
    fn test_exclusivity_without_exception_blocks() {
        let session = HashMap::new();
        let mut playbook = LegalPlaybook::new(&ProcurementRequest::default());
        step(&mut playbook, 1, &session, None);
        step(&mut playbook, 2, &session, ok("- Restriction: exclusive"));
        let Step::Finish(output) = step(&mut playbook, 3, &session, ok("No such clause found.")) else {
            panic!("expected finish");
        };
        assert_eq!(output.data["alternate_sourcing_allowed"], false);
        assert!(output.summary.contains("breach"));
    }

    #[test]
    fn test_oracle_error_finishes_early() {
        let session = HashMap::new();
        let mut playbook = LegalPlaybook::new(&ProcurementRequest::default());
        step(&mut playbook, 1, &session, None);
        let Step::Finish(output) = step(
            &mut playbook,
            2,
            &session,
            failed("Error analyzing contract: document not found"),
        ) else {
            panic!("expected finish");
        };
        assert!(output.summary.starts_with("Contract review failed on the Exclusivity clause"));
    }
}
