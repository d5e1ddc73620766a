//! Planning pipeline
//!
//! plan -> retrieve_knowledge -> validate_budget -> generate_itinerary
//! [-> optimize_route] -> reflect -> finalize, with reflect looping back to
//! generate_itinerary until the plan is approved or the reflection cap is hit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use serde_json::json;
use tracing::{debug, info, warn};

use super::engine::{END, Graph, GraphBuilder, GraphError, GraphState, Node};
use crate::capabilities::{KnowledgeSearch, PricedItem, validate_budget};
use crate::config::PlanningConfig;
use crate::itinerary::{ItineraryGenerator, optimize_routes};
use crate::providers::PlanSink;
use crate::state::{PlanState, PlanUpdate};
use crate::validation::PlanValidator;

pub const PLAN: &str = "plan";
pub const RETRIEVE_KNOWLEDGE: &str = "retrieve_knowledge";
pub const VALIDATE_BUDGET: &str = "validate_budget";
pub const GENERATE_ITINERARY: &str = "generate_itinerary";
pub const OPTIMIZE_ROUTE: &str = "optimize_route";
pub const REFLECT: &str = "reflect";
pub const FINALIZE: &str = "finalize";

impl GraphState for PlanState {
    type Update = PlanUpdate;

    fn apply(&self, update: PlanUpdate) -> Self {
        self.merge(update)
    }

    fn failure(node: &str, message: &str) -> PlanUpdate {
        PlanUpdate::new().with_error(format!("{} failed: {}", node, message))
    }
}

/// Next node after reflection
///
/// Finalize once approved or once `max_reflections` passes have run;
/// otherwise regenerate. The reflect node increments the count, so the cycle
/// runs at most `max_reflections` times.
pub fn route_after_reflection(state: &PlanState, max_reflections: u32) -> &'static str {
    debug!(
        approved = state.approved,
        reflection_count = state.reflection_count,
        max_reflections,
        "route_after_reflection: called"
    );
    if state.approved {
        debug!("route_after_reflection: approved branch");
        FINALIZE
    } else if state.reflection_count >= max_reflections {
        info!("Reflection cap ({}) reached without approval, finalizing", max_reflections);
        FINALIZE
    } else {
        debug!("route_after_reflection: regenerate branch");
        GENERATE_ITINERARY
    }
}

/// Steps a run needs to reach finalize when every reflection rejects
///
/// Three lead-in nodes, one generate/[optimize]/reflect cycle per allowed
/// reflection, then finalize.
pub fn required_steps(max_reflections: u32, route_optimization: bool) -> u32 {
    let per_cycle = if route_optimization { 3 } else { 2 };
    max_reflections.saturating_mul(per_cycle).saturating_add(4)
}

/// Collaborators of the planning nodes
#[derive(Clone)]
pub struct PlanningDeps {
    pub knowledge: Arc<KnowledgeSearch>,
    pub generator: Arc<ItineraryGenerator>,
    pub validator: Arc<PlanValidator>,
    pub sink: Arc<dyn PlanSink>,
    pub config: PlanningConfig,
}

/// Wire the planning pipeline
pub fn planning_graph(deps: PlanningDeps) -> Result<Graph<PlanState>, GraphError> {
    debug!(route_optimization = deps.config.route_optimization, "planning_graph: called");
    let max_reflections = deps.config.max_reflections.max(1);
    let required = required_steps(max_reflections, deps.config.route_optimization);
    let max_steps = if deps.config.max_graph_steps < required {
        warn!(
            "max-graph-steps {} is below the {} steps {} reflections need, raising it",
            deps.config.max_graph_steps, required, max_reflections
        );
        required
    } else {
        deps.config.max_graph_steps
    };
    let after_generation = if deps.config.route_optimization {
        OPTIMIZE_ROUTE
    } else {
        REFLECT
    };

    let mut builder = GraphBuilder::new("planning")
        .node(PLAN, PlanNode {
            route_optimization: deps.config.route_optimization,
            max_reflections,
        })
        .node(RETRIEVE_KNOWLEDGE, RetrieveKnowledgeNode {
            knowledge: deps.knowledge,
            attractions_per_day: deps.config.attractions_per_day.max(1),
        })
        .node(VALIDATE_BUDGET, ValidateBudgetNode)
        .node(GENERATE_ITINERARY, GenerateItineraryNode {
            generator: deps.generator,
        })
        .node(REFLECT, ReflectNode {
            validator: deps.validator,
        })
        .node(FINALIZE, FinalizeNode { sink: deps.sink })
        .edge(PLAN, RETRIEVE_KNOWLEDGE)
        .edge(RETRIEVE_KNOWLEDGE, VALIDATE_BUDGET)
        .edge(VALIDATE_BUDGET, GENERATE_ITINERARY)
        .edge(GENERATE_ITINERARY, after_generation)
        .conditional_edge(REFLECT, &[GENERATE_ITINERARY, FINALIZE], move |state: &PlanState| {
            route_after_reflection(state, max_reflections).to_string()
        })
        .edge(FINALIZE, END)
        .start(PLAN)
        .max_steps(max_steps);

    if deps.config.route_optimization {
        builder = builder.node(OPTIMIZE_ROUTE, OptimizeRouteNode).edge(OPTIMIZE_ROUTE, REFLECT);
    }
    builder.build()
}

struct PlanNode {
    route_optimization: bool,
    max_reflections: u32,
}

#[async_trait]
impl Node<PlanState> for PlanNode {
    async fn run(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, "PlanNode::run: called");
        let mut steps = vec![
            format!("Retrieve attractions for {}", state.destination_context()),
            "Validate budget".to_string(),
            format!("Generate {}-day itinerary", state.duration_days),
        ];
        if self.route_optimization {
            steps.push("Optimize daily routes".to_string());
        }
        steps.push(format!("Reflect and revise (up to {} passes)", self.max_reflections));
        steps.push("Finalize plan".to_string());

        PlanUpdate {
            plan_steps: Some(steps),
            ..PlanUpdate::new().step(
                PLAN,
                10,
                format!("Planning {}-day trip to {}", state.duration_days, state.destination),
            )
        }
    }
}

struct RetrieveKnowledgeNode {
    knowledge: Arc<KnowledgeSearch>,
    attractions_per_day: u32,
}

#[async_trait]
impl Node<PlanState> for RetrieveKnowledgeNode {
    async fn run(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, "RetrieveKnowledgeNode::run: called");
        let mut query = state.destination_context();
        if let Some(preferences) = state.preferences.as_deref() {
            query.push(' ');
            query.push_str(preferences);
        }
        let limit = (state.duration_days.max(1) * self.attractions_per_day) as usize;
        let attractions = self.knowledge.search(&query, limit).await;

        let message = if attractions.is_empty() {
            debug!("RetrieveKnowledgeNode::run: empty branch");
            "No attractions found, continuing without knowledge".to_string()
        } else {
            format!("Found {} attractions", attractions.len())
        };
        PlanUpdate::new()
            .step(RETRIEVE_KNOWLEDGE, 30, message)
            .with_attractions(attractions)
    }
}

struct ValidateBudgetNode;

#[async_trait]
impl Node<PlanState> for ValidateBudgetNode {
    async fn run(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, attractions = state.attractions.len(), "ValidateBudgetNode::run: called");
        let items: Vec<PricedItem> = state.attractions.iter().map(PricedItem::from_attraction).collect();
        let check = validate_budget(&items, state.budget);
        let message = if check.within_budget {
            format!("Attractions cost ${:.2} of ${:.2}", check.total_cost, check.budget)
        } else {
            format!("Attractions exceed the budget by ${:.2}", -check.remaining)
        };
        PlanUpdate::new()
            .step(VALIDATE_BUDGET, 40, message)
            .with_budget_check(check)
    }
}

struct GenerateItineraryNode {
    generator: Arc<ItineraryGenerator>,
}

#[async_trait]
impl Node<PlanState> for GenerateItineraryNode {
    async fn run(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, reflection_count = state.reflection_count, "GenerateItineraryNode::run: called");
        self.generator.generate(state).await
    }
}

struct OptimizeRouteNode;

#[async_trait]
impl Node<PlanState> for OptimizeRouteNode {
    async fn run(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, "OptimizeRouteNode::run: called");
        let report = optimize_routes(&state.itinerary, &state.geo_data);
        let update = PlanUpdate::new()
            .step(
                OPTIMIZE_ROUTE,
                75,
                format!("Optimized routes for {} days", report.optimized_days.len()),
            )
            .with_metadata("optimized_days", json!(report.optimized_days));
        if report.optimized_days.is_empty() {
            debug!("OptimizeRouteNode::run: nothing to optimize branch");
            return update;
        }
        update.with_itinerary(report.itinerary)
    }
}

struct ReflectNode {
    validator: Arc<PlanValidator>,
}

#[async_trait]
impl Node<PlanState> for ReflectNode {
    async fn run(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, reflection_count = state.reflection_count, "ReflectNode::run: called");
        let result = self.validator.validate(state).await;
        let count = state.reflection_count + 1;
        let message = format!(
            "Reflection {}: {} issues ({} critical)",
            count,
            result.issues.len(),
            result.critical_count
        );

        PlanUpdate {
            reflection_count: Some(count),
            approved: Some(result.approved),
            issues: Some(result.issue_lines()),
            revision_suggestions: Some(result.revision_suggestions()),
            validation: Some(result),
            ..PlanUpdate::new().step(REFLECT, 80, message)
        }
    }
}

struct FinalizeNode {
    sink: Arc<dyn PlanSink>,
}

#[async_trait]
impl Node<PlanState> for FinalizeNode {
    async fn run(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, approved = state.approved, "FinalizeNode::run: called");
        let mut days = state.itinerary.clone();
        for (i, day) in days.iter_mut().enumerate() {
            day.day_number = i as u32 + 1;
            if let Some(start) = state.start_date {
                day.date = start.checked_add_signed(ChronoDuration::days(i as i64));
            }
        }

        let message = if state.approved {
            "Plan finalized".to_string()
        } else {
            "Plan finalized without approval".to_string()
        };
        let update = PlanUpdate::new()
            .step(FINALIZE, 100, message)
            .with_itinerary(days)
            .with_metadata("approved", json!(state.approved));

        let final_state = state.merge(update.clone());
        match self.sink.persist(&final_state).await {
            Ok(()) => {
                info!("Plan {} finalized (approved: {})", state.plan_id, state.approved);
                update
            }
            Err(e) => {
                warn!("Failed to persist plan {}: {}", state.plan_id, e);
                update.with_error(format!("Failed to persist plan: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::GeocodeLocations;
    use crate::config::KnowledgeConfig;
    use crate::llm::Reasoner;
    use crate::llm::mock::MockLlmClient;
    use crate::prompts::PromptLoader;
    use crate::providers::{CatalogKnowledgeBase, MemorySink, NullGeocoder, ProviderError};
    use chrono::NaiveDate;
    use std::time::Duration;

    const GOOD_DAY: &str = r#"{"days": [{"dayNumber": 1, "theme": "Old Town", "activities": [
        {"name": "Hotel Sol", "type": "accommodation", "startTime": "08:00", "durationMinutes": 60, "estimatedCost": 90},
        {"name": "Cathedral", "type": "activity", "startTime": "09:30", "durationMinutes": 120, "estimatedCost": 10},
        {"name": "Market Lunch", "type": "dining", "startTime": "12:00", "durationMinutes": 60, "estimatedCost": 20},
        {"name": "River Walk", "type": "activity", "startTime": "14:00", "durationMinutes": 90, "estimatedCost": 0}
    ]}]}"#;

    struct FailingSink;

    #[async_trait]
    impl PlanSink for FailingSink {
        async fn persist(&self, _state: &PlanState) -> Result<(), ProviderError> {
            Err(ProviderError::Failed("disk full".to_string()))
        }
    }

    fn deps(reply: &str, sink: Arc<dyn PlanSink>, config: PlanningConfig) -> PlanningDeps {
        let client = Arc::new(MockLlmClient::always(reply));
        let prompts = Arc::new(PromptLoader::embedded_only());
        let reasoner = Reasoner::new(client, Duration::from_secs(1));
        PlanningDeps {
            knowledge: Arc::new(KnowledgeSearch::new(
                Arc::new(CatalogKnowledgeBase::empty()),
                &KnowledgeConfig::default(),
            )),
            generator: Arc::new(ItineraryGenerator::new(
                reasoner,
                prompts,
                Arc::new(GeocodeLocations::new(Arc::new(NullGeocoder))),
            )),
            validator: Arc::new(PlanValidator::new()),
            sink,
            config,
        }
    }

    fn state(days: u32) -> PlanState {
        PlanState {
            plan_id: "plan-1".to_string(),
            destination: "Seville".to_string(),
            duration_days: days,
            budget: 300.0,
            party_size: 2,
            start_date: NaiveDate::from_ymd_opt(2026, 5, 1),
            ..Default::default()
        }
    }

    #[test]
    fn test_route_after_reflection() {
        let mut s = state(1);
        s.reflection_count = 2;
        assert_eq!(route_after_reflection(&s, 3), GENERATE_ITINERARY);
        s.reflection_count = 3;
        assert_eq!(route_after_reflection(&s, 3), FINALIZE);
        for count in [0, 1, 2, 3, 7] {
            s.reflection_count = count;
            s.approved = true;
            assert_eq!(route_after_reflection(&s, 3), FINALIZE);
        }
    }

    #[tokio::test]
    async fn test_approved_plan_runs_straight_through() {
        let sink = Arc::new(MemorySink::new());
        let graph = planning_graph(deps(GOOD_DAY, sink.clone(), PlanningConfig::default())).unwrap();

        let run = graph.run(state(1)).await.unwrap();
        assert_eq!(run.path, vec![
            PLAN,
            RETRIEVE_KNOWLEDGE,
            VALIDATE_BUDGET,
            GENERATE_ITINERARY,
            REFLECT,
            FINALIZE
        ]);
        let final_state = &run.state;
        assert!(final_state.approved, "issues: {:?}", final_state.issues);
        assert_eq!(final_state.reflection_count, 1);
        assert_eq!(final_state.progress.percent, 100);
        assert_eq!(final_state.itinerary[0].date, NaiveDate::from_ymd_opt(2026, 5, 1));
        assert_eq!(final_state.plan_steps.len(), 5);

        let persisted = sink.plans();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].itinerary, final_state.itinerary);
    }

    #[tokio::test]
    async fn test_rejected_plan_stops_at_cap() {
        // Three days requested, one generated: always critical
        let sink = Arc::new(MemorySink::new());
        let graph = planning_graph(deps(GOOD_DAY, sink.clone(), PlanningConfig::default())).unwrap();

        let run = graph.run(state(3)).await.unwrap();
        assert_eq!(run.visits(GENERATE_ITINERARY), 3);
        assert_eq!(run.visits(REFLECT), 3);
        assert_eq!(run.path.last().map(String::as_str), Some(FINALIZE));
        assert!(!run.state.approved);
        assert_eq!(run.state.reflection_count, 3);
        assert!(
            run.state
                .revision_suggestions
                .iter()
                .any(|s| s.contains("3 days"))
        );
        assert_eq!(sink.plans().len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_is_recorded() {
        let graph = planning_graph(deps(GOOD_DAY, Arc::new(FailingSink), PlanningConfig::default())).unwrap();
        let run = graph.run(state(1)).await.unwrap();
        assert!(
            run.state
                .progress
                .errors
                .iter()
                .any(|e| e.starts_with("Failed to persist plan"))
        );
        assert_eq!(run.state.progress.current_step, FINALIZE);
    }

    #[tokio::test]
    async fn test_route_optimization_node_is_optional() {
        let config = PlanningConfig {
            route_optimization: true,
            ..Default::default()
        };
        let graph = planning_graph(deps(GOOD_DAY, Arc::new(MemorySink::new()), config)).unwrap();
        assert!(graph.has_node(OPTIMIZE_ROUTE));

        let run = graph.run(state(1)).await.unwrap();
        let position = |name: &str| run.path.iter().position(|n| n == name);
        assert_eq!(position(OPTIMIZE_ROUTE), Some(4));
        assert_eq!(position(REFLECT), Some(5));

        let default_graph = planning_graph(deps(GOOD_DAY, Arc::new(MemorySink::new()), PlanningConfig::default())).unwrap();
        assert!(!default_graph.has_node(OPTIMIZE_ROUTE));
    }

    #[test]
    fn test_required_steps() {
        assert_eq!(required_steps(3, false), 10);
        assert_eq!(required_steps(3, true), 13);
        assert_eq!(required_steps(u32::MAX, true), u32::MAX);
    }

    #[tokio::test]
    async fn test_high_reflection_cap_still_finalizes() {
        let sink = Arc::new(MemorySink::new());
        let config = PlanningConfig {
            max_reflections: 30,
            route_optimization: true,
            ..Default::default()
        };
        let graph = planning_graph(deps(GOOD_DAY, sink.clone(), config)).unwrap();
        assert_eq!(graph.step_limit(), required_steps(30, true));

        let run = graph.run(state(3)).await.unwrap();
        assert_eq!(run.visits(REFLECT), 30);
        assert_eq!(run.path.last().map(String::as_str), Some(FINALIZE));
        assert_eq!(run.steps(), required_steps(30, true) as usize);
        assert!(!run.state.approved);
        assert_eq!(sink.plans().len(), 1);
    }

    #[tokio::test]
    async fn test_generous_step_limit_is_kept() {
        let config = PlanningConfig {
            max_graph_steps: 80,
            ..Default::default()
        };
        let graph = planning_graph(deps(GOOD_DAY, Arc::new(MemorySink::new()), config)).unwrap();
        assert_eq!(graph.step_limit(), 80);
    }

    #[tokio::test]
    async fn test_generation_failure_still_finishes() {
        let sink = Arc::new(MemorySink::new());
        let graph = planning_graph(deps("not json at all", sink.clone(), PlanningConfig::default())).unwrap();
        let run = graph.run(state(1)).await.unwrap();
        assert!(!run.state.approved);
        assert!(run.state.itinerary.is_empty());
        assert_eq!(run.state.reflection_count, 3);
        assert!(!run.state.progress.errors.is_empty());
    }
}
