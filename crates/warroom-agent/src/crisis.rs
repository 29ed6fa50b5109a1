use crate::playbooks::{
    CommanderPlaybook, InventoryPlaybook, LegalPlaybook, LogisticsPlaybook,
    PurchaseOrderPlaybook, SourcingPlaybook,
};
use crate::profiles::{
    commander_profile, inventory_profile, legal_profile, logistics_profile,
    purchase_order_profile, sourcing_profile,
};
use crate::request::ProcurementRequest;
use crate::runner::AgentRunner;
use crate::toolbox::Toolbox;
use std::sync::Arc;
use tracing::info;
use warroom_orchestrator::{Branch, ParallelBranch, SequentialBranch};

/// Name of the outer sequence.
pub const COMMANDER_SEQUENCE: &str = "incident_commander";
/// Name of the parallel specialist group.
pub const SPECIALIST_GROUP: &str = "source_gpus_parallel_agent";

/// Assemble the crisis pipeline for `request`:
///
/// ```text
/// incident_commander (sequential)
/// ├── source_gpus_parallel_agent (parallel)
/// │   ├── inventory_agent
/// │   ├── legal_agent
/// │   └── logistics_agent
/// ├── source_gpus_merge_agent
/// ├── purchase_order_agent
/// └── root_agent              (terminal summary)
/// ```
///
/// The result is ready for [`MergeEngine::new`](warroom_orchestrator::MergeEngine::new).
pub fn build_pipeline(toolbox: Arc<Toolbox>, request: &ProcurementRequest) -> Vec<Box<dyn Branch>> {
    info!(
        chip = %request.chip,
        quantity = request.quantity,
        run_id = %toolbox.run_id(),
        "Assembling crisis pipeline"
    );

    let specialists: Vec<Box<dyn Branch>> = vec![
        Box::new(AgentRunner::new(
            inventory_profile(),
            Box::new(InventoryPlaybook::new(request)),
            toolbox.clone(),
        )),
        Box::new(AgentRunner::new(
            legal_profile(),
            Box::new(LegalPlaybook::new(request)),
            toolbox.clone(),
        )),
        Box::new(AgentRunner::new(
            logistics_profile(),
            Box::new(LogisticsPlaybook::new(request)),
            toolbox.clone(),
        )),
    ];

    let sequence: Vec<Box<dyn Branch>> = vec![
        Box::new(ParallelBranch::new(SPECIALIST_GROUP, specialists)),
        Box::new(AgentRunner::new(
            sourcing_profile(),
            Box::new(SourcingPlaybook::new(request)),
            toolbox.clone(),
        )),
        Box::new(AgentRunner::new(
            purchase_order_profile(),
            Box::new(PurchaseOrderPlaybook::new(request)),
            toolbox.clone(),
        )),
        Box::new(AgentRunner::new(
            commander_profile(),
            Box::new(CommanderPlaybook::new()),
            toolbox,
        )),
    ];

    vec![Box::new(SequentialBranch::new(COMMANDER_SEQUENCE, sequence))]
}
