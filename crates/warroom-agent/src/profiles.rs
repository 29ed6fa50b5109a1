use warroom_security::{Capability, PermissionSet};

/// Session key of the inventory findings.
pub const INVENTORY_RESULT: &str = "inventory_agent_result";
/// Session key of the contract findings.
pub const LEGAL_RESULT: &str = "legal_agent_result";
/// Session key of the market findings.
pub const LOGISTICS_RESULT: &str = "logistics_agent_result";
/// Session key of the consolidated sourcing plan.
pub const SOURCING_RESULT: &str = "source_gpus_result";
/// Session key of the purchase order.
pub const PURCHASE_ORDER_RESULT: &str = "purchase_order_result";
/// Session key of the commander's final summary.
pub const COMMANDER_RESULT: &str = "commander_summary";

/// Static description of one agent: identity, permissions and turn budget.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Agent name; also the author of its events.
    pub name: String,
    /// Session key its output is published under.
    pub output_key: String,
    /// One-line description for logs and diagnostics.
    pub description: String,
    /// Capabilities its tool calls run with.
    pub permissions: PermissionSet,
    /// Tool-call budget before the agent is considered stuck.
    pub max_turns: u32,
    /// Whether its final text is the run's final response.
    pub terminal: bool,
}

impl AgentProfile {
    fn new(name: &str, output_key: &str, description: &str, max_turns: u32) -> Self {
        Self {
            name: name.to_string(),
            output_key: output_key.to_string(),
            description: description.to_string(),
            permissions: PermissionSet::new(),
            max_turns,
            terminal: false,
        }
    }

    fn with(mut self, cap: Capability) -> Self {
        self.permissions.grant(cap);
        self
    }
}

/// Finds internal stock through the catalog mapping and the legacy table.
pub fn inventory_profile() -> AgentProfile {
    AgentProfile::new(
        "inventory_agent",
        INVENTORY_RESULT,
        "Locates internal stock, including quarantine and hold bins",
        10,
    )
    .with(Capability::DatabaseQuery)
}

/// Reads the supply agreement for restrictions and exceptions.
pub fn legal_profile() -> AgentProfile {
    AgentProfile::new(
        "legal_agent",
        LEGAL_RESULT,
        "Checks exclusivity and force majeure terms of the supply agreement",
        6,
    )
    .with(Capability::DocumentAnalysis)
}

/// Prices spot-market stock and shipping.
pub fn logistics_profile() -> AgentProfile {
    AgentProfile::new(
        "logistics_agent",
        LOGISTICS_RESULT,
        "Quotes spot-market availability and shipping",
        6,
    )
    .with(Capability::MarketApi)
}

/// Consolidates the specialists into the tracker and executive report.
pub fn sourcing_profile() -> AgentProfile {
    AgentProfile::new(
        "source_gpus_merge_agent",
        SOURCING_RESULT,
        "Records findings in the procurement tracker and publishes the executive report",
        12,
    )
    .with(Capability::WorkspaceRead)
    .with(Capability::WorkspaceWrite)
    .with(Capability::ReportPublish)
}

/// Turns the executive report into a purchase order.
pub fn purchase_order_profile() -> AgentProfile {
    AgentProfile::new(
        "purchase_order_agent",
        PURCHASE_ORDER_RESULT,
        "Drafts and publishes the purchase order",
        6,
    )
    .with(Capability::WorkspaceRead)
    .with(Capability::WorkspaceWrite)
    .with(Capability::ReportPublish)
}

/// Reports back to the user; its answer ends the run.
pub fn commander_profile() -> AgentProfile {
    let mut profile = AgentProfile::new(
        "root_agent",
        COMMANDER_RESULT,
        "Incident commander: summarizes the plan and where to find the documents",
        4,
    )
    .with(Capability::WorkspaceRead);
    profile.terminal = true;
    profile
}

/// Every profile, in pipeline order.
pub fn default_profiles() -> Vec<AgentProfile> {
    vec![
        inventory_profile(),
        legal_profile(),
        logistics_profile(),
        sourcing_profile(),
        purchase_order_profile(),
        commander_profile(),
    ]
}
