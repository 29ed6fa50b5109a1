//! Core types and error definitions for the War Room pipeline.
//!
//! This crate provides the foundational types shared across all War Room crates:
//! the error taxonomy, the immutable [`Event`] that flows from execution
//! branches to the consumer, and tool call abstractions.
//!
//! # Main types
//!
//! - [`WarroomError`]: Unified error enum for all War Room subsystems.
//! - [`WarroomResult`]: Convenience alias for `Result<T, WarroomError>`.
//! - [`Event`]: One immutable unit of output produced by a branch.
//! - [`EventContent`]: The producer-defined payload carried by an [`Event`].
//! - [`BranchId`]: Identity of the branch an event originated from.
//! - [`ToolCall`]: A tool invocation request issued by an agent.
//! - [`ToolResult`]: The result returned after executing a tool call.

/// Error taxonomy.
pub mod error;
/// Events and branch identity.
pub mod event;
/// Tool call request/response types.
pub mod tool;

pub use error::{WarroomError, WarroomResult};
pub use event::{BranchId, Event, EventContent};
pub use tool::{ToolCall, ToolResult};
