//! Workflow graphs
//!
//! A generic node/edge executor plus the two pipelines built on it.

mod engine;
mod planning;
mod recommendation;

pub use engine::{DEFAULT_MAX_STEPS, END, Edge, Graph, GraphBuilder, GraphError, GraphRun, GraphState, Node, Router};
pub use planning::{PlanningDeps, planning_graph, route_after_reflection};
pub use recommendation::{
    TOP_N, apply_ranking, fallback_reason, filter_candidates, infer_destination_type, matches_preference,
    parse_candidates, parse_reasons, recommendation_graph, search_strategy, sort_by_match_score,
};

/// Node names of the planning pipeline
pub mod planning_nodes {
    pub use super::planning::{
        FINALIZE, GENERATE_ITINERARY, OPTIMIZE_ROUTE, PLAN, REFLECT, RETRIEVE_KNOWLEDGE, VALIDATE_BUDGET,
    };
}

/// Node names of the recommendation pipeline
pub mod recommendation_nodes {
    pub use super::recommendation::{
        ANALYZE_INTENT, FILTER_BY_REGION, GENERATE_REASONS, RANK_AND_SELECT, SEARCH_CANDIDATES,
    };
}
