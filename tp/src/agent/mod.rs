//! Reasoning-acting loop
//!
//! A single-threaded controller that asks the reasoning collaborator for a
//! thought and an action, performs the action through the capability
//! registry (or the itinerary generator), and folds successful results into
//! the plan state. The loop always terminates: an explicit FINISH, a ready
//! itinerary, a repeated action or the iteration budget ends it.

mod action;
mod engine;

pub use action::{AgentAction, ParsedResponse, is_looping, parse_action, parse_response, parse_thought, preview};
pub use engine::{AgentRun, ReActAgent, TerminationReason};
