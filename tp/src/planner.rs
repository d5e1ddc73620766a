//! TripPlanner - wiring of collaborators, pipelines and the reasoning loop

use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::{AgentRun, ReActAgent};
use crate::capabilities::CapabilitySet;
use crate::config::Config;
use crate::graph::{Graph, GraphError, PlanningDeps, planning_graph, recommendation_graph};
use crate::itinerary::ItineraryGenerator;
use crate::llm::{LlmClient, Reasoner, create_client};
use crate::memory::SessionMemory;
use crate::prompts::PromptLoader;
use crate::providers::{
    CatalogKnowledgeBase, GeoapifyPlaces, Geocoder, JsonFileSink, KnowledgeBase, NominatimGeocoder, NullGeocoder,
    NullPlaces, PlacesProvider, PlanSink,
};
use crate::state::{PlanRequestError, PlanState, RecommendationRequest, RecommendationState, TripRequest};
use crate::validation::{HolisticReview, PlanValidator};

/// Errors surfaced to planner callers
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Invalid request: {0}")]
    Request(#[from] PlanRequestError),

    #[error("Workflow error: {0}")]
    Graph(#[from] GraphError),
}

/// External collaborators a planner runs against
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub geocoder: Arc<dyn Geocoder>,
    pub places: Arc<dyn PlacesProvider>,
    pub sink: Arc<dyn PlanSink>,
    pub prompts: Arc<PromptLoader>,
}

impl Collaborators {
    /// Collaborators described by the configuration
    ///
    /// A missing catalog or places key degrades to the null providers; only
    /// the LLM client is mandatory.
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("Collaborators::from_config: called");
        let llm = create_client(&config.llm).context("Failed to create LLM client")?;

        let knowledge: Arc<dyn KnowledgeBase> = match &config.knowledge.catalog_path {
            Some(path) => match CatalogKnowledgeBase::load(path) {
                Ok(catalog) => Arc::new(catalog),
                Err(e) => {
                    warn!("Failed to load catalog {}: {}", path.display(), e);
                    Arc::new(CatalogKnowledgeBase::empty())
                }
            },
            None => {
                debug!("Collaborators::from_config: no catalog branch");
                Arc::new(CatalogKnowledgeBase::empty())
            }
        };

        let geocoder: Arc<dyn Geocoder> = match NominatimGeocoder::from_config(&config.geo) {
            Ok(geocoder) => Arc::new(geocoder),
            Err(e) => {
                warn!("Geocoder unavailable, coordinates disabled: {}", e);
                Arc::new(NullGeocoder)
            }
        };

        let places: Arc<dyn PlacesProvider> = if config.geo.places_api_key().is_some() {
            match GeoapifyPlaces::from_config(&config.geo) {
                Ok(places) => Arc::new(places),
                Err(e) => {
                    warn!("Places provider unavailable: {}", e);
                    Arc::new(NullPlaces)
                }
            }
        } else {
            debug!("Collaborators::from_config: no places key branch");
            Arc::new(NullPlaces)
        };

        Ok(Self {
            llm,
            knowledge,
            geocoder,
            places,
            sink: Arc::new(JsonFileSink::new(config.storage.plans_dir())),
            prompts: Arc::new(PromptLoader::standard()),
        })
    }
}

/// Entry point for planning, recommendation and conversational runs
pub struct TripPlanner {
    planning: Graph<PlanState>,
    recommendation: Graph<RecommendationState>,
    agent: ReActAgent,
    sessions: SessionMemory,
}

impl TripPlanner {
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self, PlannerError> {
        debug!(model = %collaborators.llm.model(), "TripPlanner::new: called");
        let Collaborators {
            llm,
            knowledge,
            geocoder,
            places,
            sink,
            prompts,
        } = collaborators;

        let reasoner = Reasoner::new(Arc::clone(&llm), Duration::from_millis(config.llm.timeout_ms))
            .with_max_tokens(config.llm.max_tokens);
        let agent_reasoner =
            Reasoner::new(llm, config.agent.llm_timeout()).with_max_tokens(config.llm.max_tokens);

        let capabilities = CapabilitySet::new(knowledge, geocoder, places, config);
        let generator = Arc::new(
            ItineraryGenerator::new(reasoner.clone(), Arc::clone(&prompts), Arc::clone(&capabilities.geocode))
                .with_activities_per_day(config.planning.attractions_per_day),
        );

        let mut validator = PlanValidator::new();
        if config.planning.holistic_review {
            debug!("TripPlanner::new: holistic review branch");
            validator = validator.with_holistic(HolisticReview::new(reasoner.clone(), Arc::clone(&prompts)));
        }

        let planning = planning_graph(PlanningDeps {
            knowledge: Arc::clone(&capabilities.knowledge),
            generator: Arc::clone(&generator),
            validator: Arc::new(validator),
            sink,
            config: config.planning.clone(),
        })?;
        let recommendation = recommendation_graph(reasoner, Arc::clone(&prompts))?;

        let agent = ReActAgent::new(
            agent_reasoner,
            capabilities.registry(config.agent.capability_timeout()),
            generator,
            prompts,
            config.agent.clone(),
        )
        .with_attractions_per_day(config.planning.attractions_per_day);

        Ok(Self {
            planning,
            recommendation,
            agent,
            sessions: SessionMemory::from_config(&config.session),
        })
    }

    /// Planner over the collaborators the configuration describes
    pub fn from_config(config: &Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(config)?;
        Ok(Self::new(config, collaborators)?)
    }

    /// Run the planning pipeline to its final state
    pub async fn plan(&self, request: TripRequest) -> Result<PlanState, PlannerError> {
        debug!(destination = %request.destination, days = request.days, "TripPlanner::plan: called");
        let state = request.into_state()?;
        info!("Planning {} ({})", state.destination, state.plan_id);
        let run = self.planning.run(state).await?;
        info!("Planning finished after {} steps", run.steps());
        Ok(run.state)
    }

    /// Run the recommendation pipeline
    pub async fn recommend(&self, request: RecommendationRequest) -> Result<RecommendationState, PlannerError> {
        debug!("TripPlanner::recommend: called");
        let state = request.into_state()?;
        let run = self.recommendation.run(state).await?;
        Ok(run.state)
    }

    /// One conversational turn of the reasoning loop
    pub async fn converse(&self, session_id: &str, message: &str, request: TripRequest) -> Result<AgentRun, PlannerError> {
        debug!(%session_id, "TripPlanner::converse: called");
        let state = request.into_state()?;
        Ok(self.agent.converse(&self.sessions, session_id, message, state).await)
    }

    pub fn sessions(&self) -> &SessionMemory {
        &self.sessions
    }

    pub fn agent(&self) -> &ReActAgent {
        &self.agent
    }
}
