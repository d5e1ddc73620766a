//! ReActAgent - bounded think/act/observe loop over a plan state

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::action::{AgentAction, is_looping, parse_response, preview};
use crate::capabilities::{CapabilityCategory, CapabilityRegistry, Outcome, OutcomeData, PricedItem};
use crate::config::AgentConfig;
use crate::itinerary::ItineraryGenerator;
use crate::llm::{Reasoner, Role};
use crate::memory::SessionMemory;
use crate::prompts::PromptLoader;
use crate::state::{Coordinates, PlanState, PlanUpdate, StepRecord};

const GENERATE_DESCRIPTION: &str = "Generate a day-by-day itinerary from the attractions found";

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model chose FINISH
    Finished,
    /// An itinerary is present
    ItineraryReady,
    /// The same action repeated too many times in a row
    LoopDetected,
    /// Iteration budget exhausted
    IterationLimit,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Finished => "finished",
            TerminationReason::ItineraryReady => "itinerary_ready",
            TerminationReason::LoopDetected => "loop_detected",
            TerminationReason::IterationLimit => "iteration_limit",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final state of one loop run
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub state: PlanState,
    pub termination: TerminationReason,
    pub iterations: u32,
}

impl AgentRun {
    /// One-line account of the run for the conversation
    pub fn summary(&self) -> String {
        let state = &self.state;
        let mut parts = Vec::new();
        if state.has_itinerary() {
            parts.push(format!(
                "Planned {} days in {} with {} activities",
                state.itinerary.len(),
                state.destination_context(),
                state.total_activities()
            ));
        } else {
            parts.push(format!("No itinerary yet for {}", state.destination_context()));
        }
        if !state.attractions.is_empty() {
            parts.push(format!("{} attractions found", state.attractions.len()));
        }
        if let Some(check) = &state.budget_check {
            parts.push(if check.within_budget {
                format!("within budget (${:.2} of ${:.2})", check.total_cost, check.budget)
            } else {
                format!("over budget by ${:.2}", -check.remaining)
            });
        }
        format!(
            "{} [{} after {} steps]",
            parts.join("; "),
            self.termination,
            self.iterations
        )
    }
}

/// Result of acting on one action
#[derive(Debug)]
struct Observation {
    summary: String,
    success: bool,
    update: Option<PlanUpdate>,
}

impl Observation {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            summary: message.into(),
            success: false,
            update: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolLine {
    number: usize,
    name: String,
    category: CapabilityCategory,
    description: String,
}

#[derive(Debug, Serialize)]
struct StepLine {
    iteration: u32,
    thought: String,
    action: String,
    result: String,
}

#[derive(Debug, Serialize)]
struct ReactContext<'a> {
    destination: String,
    days: u32,
    budget: String,
    party_size: u32,
    preferences: Option<&'a str>,
    attractions_found: usize,
    budget_status: Option<String>,
    itinerary_days: usize,
    conversation: &'a [String],
    tools: Vec<ToolLine>,
    finish_number: usize,
    steps: Vec<StepLine>,
}

/// Reasoning-acting controller
///
/// Strictly sequential: one reasoning call, one action and one state merge
/// per iteration, never more than the configured iteration budget.
pub struct ReActAgent {
    reasoner: Reasoner,
    registry: CapabilityRegistry,
    generator: Arc<ItineraryGenerator>,
    prompts: Arc<PromptLoader>,
    config: AgentConfig,
    attractions_per_day: u32,
}

impl ReActAgent {
    pub fn new(
        reasoner: Reasoner,
        registry: CapabilityRegistry,
        generator: Arc<ItineraryGenerator>,
        prompts: Arc<PromptLoader>,
        config: AgentConfig,
    ) -> Self {
        debug!(max_iterations = config.effective_max_iterations(), capabilities = registry.len(), "ReActAgent::new: called");
        Self {
            reasoner,
            registry,
            generator,
            prompts,
            config,
            attractions_per_day: 4,
        }
    }

    pub fn with_attractions_per_day(mut self, count: u32) -> Self {
        self.attractions_per_day = count.max(1);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.config.effective_max_iterations()
    }

    /// Run the loop without conversation context
    pub async fn run(&self, state: PlanState) -> AgentRun {
        self.run_with_conversation(state, &[]).await
    }

    /// Run the loop until a termination condition holds
    pub async fn run_with_conversation(&self, initial: PlanState, conversation: &[String]) -> AgentRun {
        let max = self.max_iterations();
        debug!(plan_id = %initial.plan_id, max, "ReActAgent::run_with_conversation: called");
        info!("Starting reasoning loop for {} (max {} iterations)", initial.destination, max);

        let mut state = initial;
        let mut history: Vec<StepRecord> = Vec::new();
        let mut termination = TerminationReason::IterationLimit;

        for iteration in 1..=max {
            debug!(iteration, "ReActAgent::run: iteration start");
            let (thought, action) = self.reason(&state, &history, conversation).await;
            let observation = self.act(&state, &action).await;
            info!(
                "Step {}: {} -> {} ({})",
                iteration,
                action,
                observation.summary,
                if observation.success { "ok" } else { "failed" }
            );

            if observation.success
                && let Some(update) = observation.update
            {
                state = state.merge(update);
            }
            history.push(StepRecord {
                iteration,
                thought,
                action: action.to_string(),
                observation: observation.summary,
                success: observation.success,
            });

            let percent = ((iteration * 100) / max).min(95) as u8;
            state = state.merge(PlanUpdate {
                react_history: Some(history.clone()),
                step_count: Some(iteration),
                ..PlanUpdate::new().step("react", percent, format!("Step {}: {}", iteration, action))
            });

            let actions: Vec<&str> = history.iter().map(|s| s.action.as_str()).collect();
            if action.is_terminal() {
                debug!("ReActAgent::run: finish branch");
                termination = TerminationReason::Finished;
                break;
            }
            if state.has_itinerary() {
                debug!("ReActAgent::run: itinerary ready branch");
                termination = TerminationReason::ItineraryReady;
                break;
            }
            if is_looping(&actions, self.config.loop_detection_threshold) {
                warn!("Loop detected: '{}' repeated {} times", action, self.config.loop_detection_threshold);
                termination = TerminationReason::LoopDetected;
                break;
            }
        }

        let iterations = history.len() as u32;
        info!("Reasoning loop finished after {} steps: {}", iterations, termination);
        let state = state.merge(
            PlanUpdate::new()
                .step("complete", 100, format!("Reasoning loop finished: {}", termination))
                .with_metadata("termination", json!(termination.as_str())),
        );
        AgentRun {
            state,
            termination,
            iterations,
        }
    }

    /// Run one conversational turn for a session
    ///
    /// The user message and the run summary are both recorded in the
    /// session's memory; earlier turns are shown to the model.
    pub async fn converse(&self, memory: &SessionMemory, session_id: &str, message: &str, state: PlanState) -> AgentRun {
        debug!(%session_id, "ReActAgent::converse: called");
        memory.record(session_id, Role::User, message).await;
        let conversation = memory
            .transcript(session_id, self.config.history_window.max(1) * 2)
            .await;

        let run = self.run_with_conversation(state, &conversation).await;
        memory.record(session_id, Role::Assistant, run.summary()).await;
        run
    }

    fn prompt(&self, state: &PlanState, history: &[StepRecord], conversation: &[String]) -> eyre::Result<String> {
        let generate = AgentAction::GenerateItinerary.to_string();
        let tools: Vec<ToolLine> = self
            .registry
            .descriptors()
            .into_iter()
            .filter(|d| d.name != generate)
            .map(|d| (d.name, d.category, d.description))
            .chain(std::iter::once((
                generate.clone(),
                CapabilityCategory::Generation,
                GENERATE_DESCRIPTION.to_string(),
            )))
            .enumerate()
            .map(|(i, (name, category, description))| ToolLine {
                number: i + 1,
                name,
                category,
                description,
            })
            .collect();
        let finish_number = tools.len() + 1;

        let skip = history.len().saturating_sub(self.config.history_window);
        let steps = history
            .iter()
            .skip(skip)
            .map(|s| StepLine {
                iteration: s.iteration,
                thought: preview(&s.thought, self.config.thought_preview_chars),
                action: s.action.clone(),
                result: s.observation.clone(),
            })
            .collect();

        let budget_status = state.budget_check.as_ref().map(|c| {
            if c.within_budget {
                format!("within budget (${:.2} remaining)", c.remaining)
            } else {
                format!("over budget by ${:.2}", -c.remaining)
            }
        });

        let context = ReactContext {
            destination: state.destination_context(),
            days: state.duration_days,
            budget: format!("{:.2}", state.budget),
            party_size: state.party_size,
            preferences: state.preferences.as_deref(),
            attractions_found: state.attractions.len(),
            budget_status,
            itinerary_days: state.itinerary.len(),
            conversation,
            tools,
            finish_number,
            steps,
        };
        self.prompts.render("react", &context)
    }

    /// Ask for the next thought and action; failures pick the default action
    async fn reason(&self, state: &PlanState, history: &[StepRecord], conversation: &[String]) -> (String, AgentAction) {
        let prompt = match self.prompt(state, history, conversation) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Could not render reasoning prompt: {}", e);
                return (format!("Prompt error: {}", e), AgentAction::DEFAULT);
            }
        };
        match self.reasoner.chat(&prompt).await {
            Ok(reply) => {
                let parsed = parse_response(&reply);
                debug!(action = %parsed.action, "ReActAgent::reason: parsed");
                (parsed.thought, parsed.action)
            }
            Err(e) => {
                warn!("Reasoning failed, using default action: {}", e);
                (format!("Reasoning failed: {}", e), AgentAction::DEFAULT)
            }
        }
    }

    /// Capability parameters derived from the current state
    fn params_for(&self, action: &AgentAction, state: &PlanState) -> Result<Value, String> {
        match action {
            AgentAction::SearchAttractions => {
                let mut query = state.destination_context();
                if let Some(preferences) = state.preferences.as_deref() {
                    query.push(' ');
                    query.push_str(preferences);
                }
                Ok(json!({
                    "query": query,
                    "max_results": state.duration_days.max(1) * self.attractions_per_day,
                }))
            }
            AgentAction::ValidateBudget => {
                let items: Vec<PricedItem> = state.attractions.iter().map(PricedItem::from_attraction).collect();
                Ok(json!({ "items": items, "budget": state.budget }))
            }
            AgentAction::GeocodeLocations => {
                let context = state.destination_context();
                let locations: Vec<String> = state
                    .attractions
                    .iter()
                    .map(|a| format!("{}, {}", a.name, context))
                    .collect();
                Ok(json!({ "locations": locations }))
            }
            AgentAction::SearchNearby => {
                let (latitude, longitude) = state
                    .geo_data
                    .values()
                    .find_map(Coordinates::point)
                    .ok_or_else(|| "No coordinates available. Geocode locations first.".to_string())?;
                Ok(json!({ "latitude": latitude, "longitude": longitude }))
            }
            _ => Ok(json!({})),
        }
    }

    /// Perform an action against the registry or the generator
    async fn act(&self, state: &PlanState, action: &AgentAction) -> Observation {
        debug!(%action, "ReActAgent::act: called");
        match action {
            AgentAction::Finish => Observation {
                summary: "Task marked complete".to_string(),
                success: true,
                update: None,
            },
            AgentAction::GenerateItinerary => {
                if state.attractions.is_empty() {
                    debug!("ReActAgent::act: no attractions branch");
                    return Observation::failed("No attractions available. Search attractions first.");
                }
                let update = self.generator.generate(state).await;
                match &update.itinerary {
                    Some(days) => Observation {
                        summary: format!("Generated {}-day itinerary", days.len()),
                        success: true,
                        update: Some(update),
                    },
                    None => Observation::failed(
                        update
                            .progress
                            .errors
                            .first()
                            .cloned()
                            .unwrap_or_else(|| "Itinerary generation failed".to_string()),
                    ),
                }
            }
            _ => {
                let params = match self.params_for(action, state) {
                    Ok(params) => params,
                    Err(message) => return Observation::failed(message),
                };
                let outcome = self.registry.invoke(action.as_str(), params).await;
                Self::observe(state, outcome)
            }
        }
    }

    /// Turn a capability outcome into an observation and a state update
    fn observe(state: &PlanState, outcome: Outcome) -> Observation {
        if !outcome.success {
            return Observation::failed(outcome.summary);
        }
        let update = match outcome.data {
            OutcomeData::None => None,
            OutcomeData::Attractions(attractions) => Some(PlanUpdate::new().with_attractions(attractions)),
            OutcomeData::Budget(check) => Some(PlanUpdate::new().with_budget_check(check)),
            OutcomeData::Places(pois) => Some(PlanUpdate {
                points_of_interest: Some(pois),
                ..Default::default()
            }),
            OutcomeData::Coordinates(coordinates) => {
                // Queries carry the destination; key by the bare place name
                let suffix = format!(", {}", state.destination_context());
                let geo = coordinates
                    .into_iter()
                    .map(|c| {
                        let key = c
                            .source_location
                            .strip_suffix(&suffix)
                            .unwrap_or(&c.source_location)
                            .to_string();
                        (key, c)
                    })
                    .collect();
                Some(PlanUpdate::new().with_geo_data(geo))
            }
        };
        Observation {
            summary: outcome.summary,
            success: true,
            update,
        }
    }
}
