//! TripPlanner - LLM-driven travel itinerary planner
//!
//! Plans trips by coordinating reasoning calls, capability calls and a
//! validation pass, iterating until the plan is acceptable or a bound is hit.
//!
//! # Core Concepts
//!
//! - **Copy-on-write state**: every step merges a typed partial update into a
//!   fresh copy of the plan state
//! - **Capabilities never throw**: each call resolves to an `Outcome`
//! - **Bounded loops**: iteration caps, loop detection and a reflection cap
//!   guarantee termination
//!
//! # Modules
//!
//! - [`state`] - Plan and recommendation state records
//! - [`capabilities`] - Named capabilities and their registry
//! - [`agent`] - Reasoning-acting loop
//! - [`graph`] - Workflow graph engine and the planning/recommendation pipelines
//! - [`validation`] - Plan validator
//! - [`itinerary`] - Itinerary generation and route optimization
//! - [`llm`] - Reasoning client abstraction
//! - [`providers`] - External collaborators
//! - [`memory`] - Per-session conversation memory
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agent;
pub mod capabilities;
pub mod cli;
pub mod config;
pub mod graph;
pub mod itinerary;
pub mod llm;
pub mod memory;
pub mod planner;
pub mod prompts;
pub mod providers;
pub mod report;
pub mod state;
pub mod validation;

// Re-export commonly used types
pub use agent::{AgentAction, AgentRun, ReActAgent, TerminationReason};
pub use capabilities::{Capability, CapabilityRegistry, CapabilitySet, Outcome, OutcomeData};
pub use config::{Config, LlmConfig};
pub use graph::{END, Graph, GraphBuilder, GraphError, GraphRun, GraphState, Node};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, Reasoner, create_client};
pub use memory::SessionMemory;
pub use planner::{Collaborators, PlannerError, TripPlanner};
pub use state::{
    PlanRequestError, PlanState, PlanUpdate, RecommendationRequest, RecommendationState, TripRequest,
};
pub use validation::{PlanValidator, ReflectionResult, ValidationIssue};
