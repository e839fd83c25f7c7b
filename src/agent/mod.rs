//! Agent orchestration: conversation state, the planner and critic agents,
//! and the team loop that alternates them.

mod conversation;
mod critic;
mod planner;
mod team;

pub use conversation::{Conversation, Speaker, TerminationReason, ToolCallRecord, Turn};
pub use critic::{CriticAgent, CriticStep};
pub use planner::{PlannerAgent, PlannerStep};
pub use team::{AgentTeam, TeamConfig, TeamEvent, TeamResult};
