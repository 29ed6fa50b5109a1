use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A permission an agent needs before the registry dispatches a skill for it.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read files from the sandboxed workspace.
    WorkspaceRead,
    /// Create, overwrite, or append files in the sandboxed workspace.
    WorkspaceWrite,
    /// Run schema discovery and queries against the tabular store.
    DatabaseQuery,
    /// Ask the document-analysis oracle about contract clauses.
    DocumentAnalysis,
    /// Call the external market-data and shipping endpoints.
    MarketApi,
    /// Publish reports to the report sink.
    ReportPublish,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 6] = [
        Capability::WorkspaceRead,
        Capability::WorkspaceWrite,
        Capability::DatabaseQuery,
        Capability::DocumentAnalysis,
        Capability::MarketApi,
        Capability::ReportPublish,
    ];
}

/// The set of capabilities granted to one agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    capabilities: HashSet<Capability>,
}

impl PermissionSet {
    /// An empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A permission set holding every capability.
    pub fn all() -> Self {
        Self::from_iter(Capability::ALL)
    }

    /// Grant a capability.
    pub fn grant(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    /// Builder-style [`grant`](Self::grant).
    pub fn with(mut self, cap: Capability) -> Self {
        self.grant(cap);
        self
    }

    /// Revoke a capability.
    pub fn revoke(&mut self, cap: &Capability) {
        self.capabilities.remove(cap);
    }

    /// Whether the capability is granted.
    pub fn has(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Whether nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Iterate over granted capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }
}

impl FromIterator<Capability> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_set() {
        let mut perms = PermissionSet::new();
        assert!(perms.is_empty());

        perms.grant(Capability::DatabaseQuery);
        assert!(perms.has(&Capability::DatabaseQuery));
        assert!(!perms.has(&Capability::WorkspaceWrite));

        perms.revoke(&Capability::DatabaseQuery);
        assert!(perms.is_empty());
    }

    #[test]
    fn test_all_grants_everything() {
        let perms = PermissionSet::all();
        for cap in &Capability::ALL {
            assert!(perms.has(cap));
        }
        assert_eq!(perms.iter().count(), Capability::ALL.len());
    }

    #[test]
    fn test_builder_and_serialization() {
        let perms = PermissionSet::new()
            .with(Capability::WorkspaceRead)
            .with(Capability::ReportPublish);
        let json = serde_json::to_string(&perms).unwrap();
        assert!(json.contains("workspace_read"));
        let parsed: PermissionSet = serde_json::from_str(&json).unwrap();
        assert!(parsed.has(&Capability::ReportPublish));
    }
}
