//! Built-in collaborators and skills for the War Room agents.
//!
//! Each collaborator is a plain Rust type usable on its own; the skills wrap
//! them behind the JSON tool-call contract so agents can invoke them through
//! the [`SkillRegistry`].
//!
//! # Main entry points
//!
//! - [`FileStore`]: Sandboxed workspace files (list/read/write/append).
//! - [`SqliteStore`]: Tabular store with schema discovery and free-form SQL.
//! - [`ClauseIndexOracle`]: Contract clause lookup and interpretation.
//! - [`MarketClient`]: Spot-price and shipping-estimate HTTP endpoints.
//! - [`ReportPublisher`]: Local backup plus optional remote [`ReportSink`].
//! - [`Collaborators::register`]: Register every skill into a registry.

/// Document-analysis oracle and skill.
pub mod contract;
/// Tabular store and skills.
pub mod database;
/// Sandboxed file store and skills.
pub mod file_store;
/// Market-data client and skills.
pub mod market;
/// Report publishing and skill.
pub mod report;

pub use contract::{
    write_demo_documents, AnalyzeContractSkill, ClauseIndexOracle, DocumentOracle, Section,
    NO_SUCH_CLAUSE, SUPPLY_AGREEMENT, WAREHOUSE_MANUAL,
};
pub use database::{ExploreSchemaSkill, RunQuerySkill, SqliteStore, TabularStore};
pub use file_store::{AppendToLogSkill, FileStore, ListFilesSkill, ReadFileSkill, WriteFileSkill};
pub use market::{EstimateShippingSkill, FetchSpotPricesSkill, MarketClient};
pub use report::{
    HttpReportSink, PublishOutcome, RemoteReceipt, ReportPublisher, ReportSink, UploadReportSkill,
};

use std::sync::Arc;
use tracing::warn;
use warroom_core::{ToolCall, ToolResult};
use warroom_skills::SkillRegistry;

/// The external collaborators, constructed once at start-up and shared.
#[derive(Clone)]
pub struct Collaborators {
    /// Workspace file store.
    pub files: Arc<FileStore>,
    /// Tabular query store.
    pub database: Arc<dyn TabularStore>,
    /// Contract oracle.
    pub contracts: Arc<dyn DocumentOracle>,
    /// Market-data client.
    pub market: Arc<MarketClient>,
    /// Report publisher.
    pub reports: Arc<ReportPublisher>,
}

impl Collaborators {
    /// Register every built-in skill over these collaborators.
    pub fn register(&self, registry: &mut SkillRegistry) {
        registry.register(Arc::new(ListFilesSkill::new(self.files.clone())));
        registry.register(Arc::new(ReadFileSkill::new(self.files.clone())));
        registry.register(Arc::new(WriteFileSkill::new(self.files.clone())));
        registry.register(Arc::new(AppendToLogSkill::new(self.files.clone())));
        registry.register(Arc::new(ExploreSchemaSkill::new(self.database.clone())));
        registry.register(Arc::new(RunQuerySkill::new(self.database.clone())));
        registry.register(Arc::new(AnalyzeContractSkill::new(self.contracts.clone())));
        registry.register(Arc::new(FetchSpotPricesSkill::new(self.market.clone())));
        registry.register(Arc::new(EstimateShippingSkill::new(self.market.clone())));
        registry.register(Arc::new(UploadReportSkill::new(self.reports.clone())));
    }
}

/// Non-empty string argument `key` of `call`.
pub(crate) fn str_arg<'a>(call: &'a ToolCall, key: &str) -> Option<&'a str> {
    call.arguments
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Error result for `call`, logged at warn level.
pub(crate) fn tool_error(call: &ToolCall, message: impl Into<String>) -> ToolResult {
    let message = message.into();
    warn!(tool = %call.name, error = %message, "Tool call failed");
    ToolResult::error(&call.id, message)
}
