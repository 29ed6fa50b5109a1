//! Skills are the tools an agent can invoke.
//!
//! A [`Skill`] wraps one collaborator operation behind a JSON-in/JSON-out
//! contract; the [`SkillRegistry`] dispatches [`ToolCall`](warroom_core::ToolCall)s
//! to skills after checking the caller's [`PermissionSet`](warroom_security::PermissionSet).

/// Skill registry.
pub mod registry;
/// Skill trait and descriptor.
pub mod skill;

pub use registry::SkillRegistry;
pub use skill::{Skill, SkillDescriptor};
