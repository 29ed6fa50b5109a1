//! Security primitives for the War Room pipeline.
//!
//! Provides capabilities, permission sets, the workspace path guard, and
//! the audit trail used by the agent runner.
//!
//! # Main types
//!
//! - [`Capability`]: A coarse permission token (workspace, database, market, ...).
//! - [`PermissionSet`]: A collection of granted capabilities.
//! - [`WorkspaceGuard`]: Resolves file names inside a fixed root, rejecting traversal.
//! - [`AuditLog`]: Append-only audit trail persisted as JSON lines.

/// Audit logging module.
pub mod audit;
/// Capability and permission definitions.
pub mod capability;
/// Workspace path sandboxing.
pub mod sandbox;

pub use audit::{AuditEntry, AuditLog, AuditOutcome};
pub use capability::{Capability, PermissionSet};
pub use sandbox::WorkspaceGuard;
