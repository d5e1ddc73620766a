//! ItineraryGenerator - reasoning-backed day plans with geocoded activities

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capabilities::{GeocodeLocations, PricedItem, validate_budget};
use crate::llm::{LlmError, Reasoner, extract_json};
use crate::prompts::PromptLoader;
use crate::state::{Attraction, Coordinates, DayPlan, PlanState, PlanUpdate};

/// Why a draft could not be produced
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Invalid itinerary format: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct BudgetSummary {
    total: String,
    budget: String,
    within: bool,
}

#[derive(Debug, Serialize)]
struct ItineraryContext<'a> {
    days: u32,
    destination: String,
    budget: String,
    party_size: u32,
    start_date: Option<String>,
    preferences: Option<&'a str>,
    attractions: &'a [Attraction],
    budget_check: Option<BudgetSummary>,
    revisions: &'a [String],
    activities_per_day: String,
}

#[derive(Debug, Deserialize)]
struct DaysEnvelope {
    days: Vec<DayPlan>,
}

/// Parse a `{"days": [...]}` reply (a bare array is accepted too)
///
/// Days come back sorted by day number.
pub fn parse_itinerary(reply: &str) -> Result<Vec<DayPlan>, GenerationError> {
    debug!(len = reply.len(), "parse_itinerary: called");
    let payload = extract_json(reply);
    let value: Value = serde_json::from_str(payload).map_err(|e| GenerationError::Parse(e.to_string()))?;

    let mut days: Vec<DayPlan> = match value {
        Value::Array(_) => {
            debug!("parse_itinerary: bare array branch");
            serde_json::from_value(value).map_err(|e| GenerationError::Parse(e.to_string()))?
        }
        Value::Object(ref map) if map.get("days").is_some_and(Value::is_array) => {
            serde_json::from_value::<DaysEnvelope>(value)
                .map_err(|e| GenerationError::Parse(e.to_string()))?
                .days
        }
        _ => return Err(GenerationError::Parse("missing 'days' array".to_string())),
    };
    days.sort_by_key(|d| d.day_number);
    Ok(days)
}

/// Produces itineraries for a plan state
pub struct ItineraryGenerator {
    reasoner: Reasoner,
    prompts: Arc<PromptLoader>,
    geocode: Arc<GeocodeLocations>,
    activities_per_day: u32,
}

impl ItineraryGenerator {
    pub fn new(reasoner: Reasoner, prompts: Arc<PromptLoader>, geocode: Arc<GeocodeLocations>) -> Self {
        debug!("ItineraryGenerator::new: called");
        Self {
            reasoner,
            prompts,
            geocode,
            activities_per_day: 4,
        }
    }

    pub fn with_activities_per_day(mut self, count: u32) -> Self {
        self.activities_per_day = count.max(1);
        self
    }

    fn prompt(&self, state: &PlanState) -> Result<String, GenerationError> {
        let activities_per_day = if self.activities_per_day > 1 {
            format!("{}-{}", self.activities_per_day - 1, self.activities_per_day)
        } else {
            "1".to_string()
        };
        let context = ItineraryContext {
            days: state.duration_days,
            destination: state.destination_context(),
            budget: format!("{:.2}", state.budget),
            party_size: state.party_size,
            start_date: state.start_date.map(|d| d.to_string()),
            preferences: state.preferences.as_deref(),
            attractions: &state.attractions,
            budget_check: state.budget_check.as_ref().map(|c| BudgetSummary {
                total: format!("{:.2}", c.total_cost),
                budget: format!("{:.2}", c.budget),
                within: c.within_budget,
            }),
            revisions: &state.revision_suggestions,
            activities_per_day,
        };
        self.prompts
            .render("itinerary", &context)
            .map_err(|e| GenerationError::Prompt(e.to_string()))
    }

    /// Ask for a draft itinerary and parse it
    pub async fn draft(&self, state: &PlanState) -> Result<Vec<DayPlan>, GenerationError> {
        debug!(days = state.duration_days, revisions = state.revision_suggestions.len(), "ItineraryGenerator::draft: called");
        let prompt = self.prompt(state)?;
        let reply = self.reasoner.chat(&prompt).await?;
        let days = parse_itinerary(&reply)?;
        if days.is_empty() {
            return Err(GenerationError::Parse("itinerary has no days".to_string()));
        }
        Ok(days)
    }

    /// Geocode activity locations not already known, in one joined batch
    ///
    /// Keys are the activities' lookup keys; queries add the destination so
    /// ambiguous place names resolve locally.
    pub async fn geocode_activities(&self, state: &PlanState, days: &[DayPlan]) -> BTreeMap<String, Coordinates> {
        let keys: BTreeSet<&str> = days
            .iter()
            .flat_map(|d| d.activities.iter())
            .map(|a| a.geo_key())
            .filter(|k| !k.trim().is_empty() && state.point_for(k).is_none())
            .collect();
        debug!(count = keys.len(), "ItineraryGenerator::geocode_activities: called");
        if keys.is_empty() {
            return BTreeMap::new();
        }

        let context = state.destination_context();
        let queries: Vec<String> = keys.iter().map(|k| format!("{}, {}", k, context)).collect();
        let results = self.geocode.geocode_batch(&queries).await;
        keys.into_iter()
            .map(str::to_string)
            .zip(results)
            .collect()
    }

    /// Full generation step as a state update
    ///
    /// Never fails: a failed draft becomes a progress error and leaves the
    /// previous itinerary in place.
    pub async fn generate(&self, state: &PlanState) -> PlanUpdate {
        debug!(plan_id = %state.plan_id, "ItineraryGenerator::generate: called");
        let days = match self.draft(state).await {
            Ok(days) => days,
            Err(e) => {
                warn!("Itinerary generation failed: {}", e);
                return PlanUpdate::new()
                    .step("generate_itinerary", 65, "Itinerary generation failed")
                    .with_error(format!("Itinerary generation failed: {}", e));
            }
        };
        info!("Generated itinerary with {} days", days.len());

        let geo = self.geocode_activities(state, &days).await;
        let priced = PricedItem::from_itinerary(&days);
        let mut update = PlanUpdate::new().step(
            "generate_itinerary",
            65,
            format!("Generated {}-day itinerary", days.len()),
        );
        if !priced.is_empty() {
            debug!(items = priced.len(), "ItineraryGenerator::generate: repricing branch");
            update = update.with_budget_check(validate_budget(&priced, state.budget));
        }
        if !geo.is_empty() {
            update = update.with_geo_data(geo);
        }
        update.with_itinerary(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockLlmClient, MockReply};
    use crate::providers::{Geocoder, ProviderError};
    use crate::state::ActivityType;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingGeocoder {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for RecordingGeocoder {
        async fn geocode(&self, location: &str) -> Result<Option<(f64, f64)>, ProviderError> {
            self.queries.lock().unwrap().push(location.to_string());
            Ok(Some((1.0, 2.0)))
        }
    }

    const REPLY: &str = r#"```json
{"days": [
  {"dayNumber": 2, "theme": "Museums", "activities": [
    {"name": "Prado", "type": "activity", "startTime": "10:00", "durationMinutes": 180, "estimatedCost": 15, "location": "Museo del Prado"}
  ]},
  {"dayNumber": 1, "theme": "Arrival", "activities": [
    {"name": "Hotel Central", "type": "accommodation", "startTime": "15:00", "durationMinutes": 60, "estimatedCost": 120},
    {"name": "Tapas", "type": "dining", "startTime": "20:00", "durationMinutes": 90, "estimatedCost": "$35", "location": "Museo del Prado"}
  ]}
]}
```"#;

    fn generator(client: MockLlmClient) -> (ItineraryGenerator, Arc<MockLlmClient>, Arc<RecordingGeocoder>) {
        let client = Arc::new(client);
        let geocoder = Arc::new(RecordingGeocoder::default());
        let generator = ItineraryGenerator::new(
            Reasoner::new(client.clone(), Duration::from_secs(1)),
            Arc::new(PromptLoader::embedded_only()),
            Arc::new(GeocodeLocations::new(geocoder.clone())),
        );
        (generator, client, geocoder)
    }

    fn state() -> PlanState {
        PlanState {
            destination: "Madrid".to_string(),
            destination_country: Some("Spain".to_string()),
            duration_days: 2,
            budget: 150.0,
            party_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_sorts_days() {
        let days = parse_itinerary(REPLY).unwrap();
        assert_eq!(days.iter().map(|d| d.day_number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(days[0].activities[0].activity_type, ActivityType::Accommodation);
        assert_eq!(days[0].activities[1].estimated_cost, Some(35.0));
    }

    #[test]
    fn test_parse_rejects_missing_days() {
        assert!(matches!(parse_itinerary(r#"{"plan": []}"#), Err(GenerationError::Parse(_))));
        assert!(matches!(parse_itinerary("no json here"), Err(GenerationError::Parse(_))));
        assert_eq!(parse_itinerary(r#"[{"day": 1, "activities": []}]"#).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_geocodes_and_reprices() {
        let (generator, _, geocoder) = generator(MockLlmClient::always(REPLY));
        let update = generator.generate(&state()).await;
        let next = state().merge(update);

        assert_eq!(next.itinerary.len(), 2);
        assert_eq!(next.progress.percent, 65);
        // Hotel Central falls back to its name; the Prado location is shared
        let mut queries = geocoder.queries.lock().unwrap().clone();
        queries.sort();
        assert_eq!(queries, vec!["Hotel Central, Madrid, Spain", "Museo del Prado, Madrid, Spain"]);
        assert!(next.point_for("Museo del Prado").is_some());

        let check = next.budget_check.unwrap();
        assert_eq!(check.total_cost, 170.0);
        assert!(!check.within_budget);
    }

    #[tokio::test]
    async fn test_cached_locations_not_requeried() {
        let (generator, _, geocoder) = generator(MockLlmClient::always(REPLY));
        let mut state = state();
        state
            .geo_data
            .insert("Museo del Prado".to_string(), Coordinates::found("Museo del Prado", 40.4, -3.7));

        let _ = generator.generate(&state).await;
        assert_eq!(geocoder.queries.lock().unwrap().as_slice(), ["Hotel Central, Madrid, Spain"]);
    }

    #[tokio::test]
    async fn test_prompt_carries_revisions() {
        let (generator, client, _) = generator(MockLlmClient::always(REPLY));
        let mut state = state();
        state.revision_suggestions = vec!["Adjust itinerary to exactly 2 days".to_string()];
        let _ = generator.generate(&state).await;
        let prompt = &client.prompts()[0];
        assert!(prompt.contains("ISSUES TO FIX FROM THE PREVIOUS DRAFT"));
        assert!(prompt.contains("- Adjust itinerary to exactly 2 days"));
        assert!(prompt.contains("Generate a 2-day travel itinerary for Madrid, Spain."));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_not_raised() {
        let (generator, _, _) = generator(MockLlmClient::new(vec![MockReply::Fail("boom".to_string())]));
        let next = state().merge(generator.generate(&state()).await);
        assert!(next.itinerary.is_empty());
        assert_eq!(next.progress.errors.len(), 1);
        assert!(next.progress.errors[0].starts_with("Itinerary generation failed"));
    }
}
