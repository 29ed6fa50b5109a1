//! Tool-executing agents for the War Room.
//!
//! An [`AgentRunner`] is a merge-engine [`Branch`](warroom_orchestrator::Branch):
//! it asks its [`Playbook`] for one step per turn, runs tool calls through
//! the permission-checked registry in the [`Toolbox`], and emits every call,
//! result and final answer as events. Agents share findings through the
//! [`SessionState`].
//!
//! [`crisis::build_pipeline`] wires the specialists into the GPU-shortage
//! response pipeline.

/// Crisis pipeline assembly.
pub mod crisis;
/// Playbook trait and step types.
pub mod playbook;
/// The specialist playbooks.
pub mod playbooks;
/// Agent profiles (identity, permissions, turn budget).
pub mod profiles;
/// The procurement request.
pub mod request;
/// Agent runner.
pub mod runner;
/// Shared session state.
pub mod session;
/// Injected collaborators.
pub mod toolbox;

pub use crisis::build_pipeline;
pub use playbook::{AgentOutput, Playbook, Step, TurnContext};
pub use profiles::AgentProfile;
pub use request::ProcurementRequest;
pub use runner::AgentRunner;
pub use session::SessionState;
pub use toolbox::Toolbox;
