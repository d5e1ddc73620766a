//! Recommendation pipeline
//!
//! analyze_intent -> search_candidates -> filter_by_region -> rank_and_select
//! -> generate_reasons. Linear; every node degrades instead of failing.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::engine::{END, Graph, GraphBuilder, GraphError, GraphState, Node};
use crate::llm::{Reasoner, extract_json};
use crate::prompts::PromptLoader;
use crate::state::{Candidate, DestinationType, Intent, RecommendationState, RecommendationUpdate, SearchStrategy};

pub const ANALYZE_INTENT: &str = "analyze_intent";
pub const SEARCH_CANDIDATES: &str = "search_candidates";
pub const FILTER_BY_REGION: &str = "filter_by_region";
pub const RANK_AND_SELECT: &str = "rank_and_select";
pub const GENERATE_REASONS: &str = "generate_reasons";

/// Recommendations returned to the caller
pub const TOP_N: usize = 3;

const REGION_WORDS: &[&str] = &["europe", "asia", "america", "africa"];
const VAGUE_WORDS: &[&str] = &["beach", "mountain", "island"];
const COUNTRY_WORDS: &[&str] = &["china", "japan", "france"];

/// Region phrase -> countries that belong to it
const REGION_COUNTRIES: &[(&str, &[&str])] = &[
    ("south america", &["brazil", "argentina", "peru", "chile", "colombia", "ecuador"]),
    ("europe", &["france", "italy", "spain", "germany", "uk", "greece"]),
    ("asia", &["japan", "china", "thailand", "vietnam", "korea", "singapore"]),
    ("north america", &["usa", "canada", "mexico"]),
];

impl GraphState for RecommendationState {
    type Update = RecommendationUpdate;

    fn apply(&self, update: RecommendationUpdate) -> Self {
        self.merge(update)
    }

    fn failure(node: &str, message: &str) -> RecommendationUpdate {
        RecommendationUpdate::default().with_error(format!("{} failed: {}", node, message))
    }
}

/// Classify how specific a destination preference is
pub fn infer_destination_type(preference: Option<&str>) -> DestinationType {
    let Some(preference) = preference.map(str::trim).filter(|p| !p.is_empty()) else {
        return DestinationType::Unknown;
    };
    let lower = preference.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if mentions(REGION_WORDS) {
        DestinationType::Region
    } else if mentions(VAGUE_WORDS) {
        DestinationType::Vague
    } else if mentions(COUNTRY_WORDS) {
        DestinationType::Country
    } else {
        DestinationType::City
    }
}

pub fn search_strategy(preference: Option<&str>, interests: &[String]) -> SearchStrategy {
    if preference.is_some_and(|p| !p.trim().is_empty()) {
        SearchStrategy::DestinationFocused
    } else if !interests.is_empty() {
        SearchStrategy::InterestFocused
    } else {
        SearchStrategy::General
    }
}

/// Whether a candidate satisfies the destination preference
///
/// A known region phrase matches on the candidate's country; anything else is
/// a case-insensitive substring match on name or country.
pub fn matches_preference(candidate: &Candidate, preference: &str) -> bool {
    let preference = preference.to_lowercase();
    let name = candidate.name.to_lowercase();
    let country = candidate.country.to_lowercase();
    if name.is_empty() && country.is_empty() {
        return false;
    }

    if let Some((_, countries)) = REGION_COUNTRIES.iter().find(|(region, _)| preference.contains(region))
        && countries.iter().any(|c| country.contains(c))
    {
        return true;
    }
    name.contains(&preference) || country.contains(&preference)
}

/// Keep the candidates matching the preference, or all of them when none do
pub fn filter_candidates(candidates: &[Candidate], preference: Option<&str>) -> Vec<Candidate> {
    debug!(candidates = candidates.len(), ?preference, "filter_candidates: called");
    let Some(preference) = preference.map(str::trim).filter(|p| !p.is_empty()) else {
        return candidates.to_vec();
    };
    let filtered: Vec<Candidate> = candidates
        .iter()
        .filter(|c| matches_preference(c, preference))
        .cloned()
        .collect();
    if filtered.is_empty() {
        debug!("filter_candidates: no match branch");
        warn!("No candidates match '{}', keeping all {}", preference, candidates.len());
        return candidates.to_vec();
    }
    filtered
}

/// Candidates parsed from a reasoning reply: a bare array or `{"candidates": [...]}`
pub fn parse_candidates(reply: &str) -> Result<Vec<Candidate>, serde_json::Error> {
    let value: Value = serde_json::from_str(extract_json(reply))?;
    let items = match value {
        Value::Object(mut map) => map.remove("candidates").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    let candidates: Vec<Candidate> = serde_json::from_value(items)?;
    Ok(candidates.into_iter().filter(|c| !c.name.trim().is_empty()).collect())
}

/// Reorder by 1-based indices; out-of-range and repeated indices are ignored
/// and candidates left unranked keep their order at the end. Malformed
/// replies keep the original order.
pub fn apply_ranking(reply: &str, candidates: &[Candidate]) -> Vec<Candidate> {
    debug!(candidates = candidates.len(), "apply_ranking: called");
    let indices = match serde_json::from_str::<Vec<Value>>(extract_json(reply)) {
        Ok(indices) if !indices.is_empty() => indices,
        Ok(_) => return candidates.to_vec(),
        Err(e) => {
            warn!("Failed to parse ranking: {}", e);
            return candidates.to_vec();
        }
    };

    let mut seen = HashSet::new();
    let mut ranked = Vec::with_capacity(candidates.len());
    for index in indices.iter().filter_map(Value::as_u64) {
        let index = index as usize;
        if (1..=candidates.len()).contains(&index) && seen.insert(index - 1) {
            ranked.push(candidates[index - 1].clone());
        }
    }
    for (i, candidate) in candidates.iter().enumerate() {
        if !seen.contains(&i) {
            ranked.push(candidate.clone());
        }
    }
    ranked
}

pub fn sort_by_match_score(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    sorted
}

/// 1-based index -> reason, from `[{index, reason}]` or `{"reasons": [...]}`
pub fn parse_reasons(reply: &str) -> BTreeMap<usize, String> {
    let value: Value = match serde_json::from_str(extract_json(reply)) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse recommendation reasons: {}", e);
            return BTreeMap::new();
        }
    };
    let entries = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map.get("reasons").and_then(Value::as_array).map_or(&[][..], Vec::as_slice),
        _ => &[],
    };
    entries
        .iter()
        .filter_map(|entry| {
            let index = entry.get("index")?.as_u64()? as usize;
            let reason = entry.get("reason")?.as_str()?.trim();
            (index > 0 && !reason.is_empty()).then(|| (index, reason.to_string()))
        })
        .collect()
}

pub fn fallback_reason(candidate: &Candidate) -> String {
    format!("{} is a strong match for your interests and travel style.", candidate.name)
}

/// Wire the recommendation pipeline
pub fn recommendation_graph(reasoner: Reasoner, prompts: Arc<PromptLoader>) -> Result<Graph<RecommendationState>, GraphError> {
    debug!("recommendation_graph: called");
    GraphBuilder::new("recommendation")
        .node(ANALYZE_INTENT, AnalyzeIntentNode)
        .node(SEARCH_CANDIDATES, SearchCandidatesNode {
            reasoner: reasoner.clone(),
            prompts: Arc::clone(&prompts),
        })
        .node(FILTER_BY_REGION, FilterByRegionNode)
        .node(RANK_AND_SELECT, RankAndSelectNode {
            reasoner: reasoner.clone(),
            prompts: Arc::clone(&prompts),
        })
        .node(GENERATE_REASONS, GenerateReasonsNode { reasoner, prompts })
        .edge(ANALYZE_INTENT, SEARCH_CANDIDATES)
        .edge(SEARCH_CANDIDATES, FILTER_BY_REGION)
        .edge(FILTER_BY_REGION, RANK_AND_SELECT)
        .edge(RANK_AND_SELECT, GENERATE_REASONS)
        .edge(GENERATE_REASONS, END)
        .start(ANALYZE_INTENT)
        .build()
}

/// Shared prompt context of the reasoning nodes
fn traveller_context(state: &RecommendationState) -> serde_json::Map<String, Value> {
    let mut context = serde_json::Map::new();
    context.insert("preference".to_string(), json!(state.preference()));
    context.insert("interests".to_string(), json!(state.interests));
    context.insert("mood".to_string(), json!(state.mood));
    context.insert("budget_level".to_string(), json!(state.budget_level));
    context.insert("days".to_string(), json!(state.days));
    context
}

fn numbered(candidates: &[Candidate]) -> Value {
    Value::Array(
        candidates
            .iter()
            .enumerate()
            .map(|(i, c)| {
                json!({
                    "index": i + 1,
                    "name": c.name,
                    "country": c.country,
                    "description": c.description,
                })
            })
            .collect(),
    )
}

struct AnalyzeIntentNode;

#[async_trait]
impl Node<RecommendationState> for AnalyzeIntentNode {
    async fn run(&self, state: &RecommendationState) -> RecommendationUpdate {
        debug!(preference = ?state.preference(), "AnalyzeIntentNode::run: called");
        let intent = Intent {
            destination_type: infer_destination_type(state.preference()),
            search_strategy: search_strategy(state.preference(), &state.interests),
        };
        info!(
            "Intent analyzed: type={:?}, strategy={:?}",
            intent.destination_type, intent.search_strategy
        );
        RecommendationUpdate {
            intent: Some(intent),
            ..RecommendationUpdate::step(ANALYZE_INTENT, 10, "Analyzing your preferences...")
        }
    }
}

struct SearchCandidatesNode {
    reasoner: Reasoner,
    prompts: Arc<PromptLoader>,
}

impl SearchCandidatesNode {
    async fn candidates(&self, state: &RecommendationState) -> eyre::Result<Vec<Candidate>> {
        let intent = state.intent.clone().unwrap_or_default();
        let mut context = traveller_context(state);
        context.insert("destination_type".to_string(), json!(intent.destination_type));
        context.insert("strategy".to_string(), json!(intent.search_strategy));
        context.insert("exclude".to_string(), json!(state.exclude_names));

        let prompt = self.prompts.render("candidates", &context)?;
        let reply = self.reasoner.chat(&prompt).await?;
        Ok(parse_candidates(&reply)?)
    }
}

#[async_trait]
impl Node<RecommendationState> for SearchCandidatesNode {
    async fn run(&self, state: &RecommendationState) -> RecommendationUpdate {
        debug!(exclude = state.exclude_names.len(), "SearchCandidatesNode::run: called");
        let update = RecommendationUpdate::step(SEARCH_CANDIDATES, 30, "Searching destinations...");
        match self.candidates(state).await {
            Ok(found) => {
                let excluded: HashSet<String> = state.exclude_names.iter().map(|n| n.trim().to_lowercase()).collect();
                let candidates: Vec<Candidate> = found
                    .into_iter()
                    .filter(|c| !excluded.contains(&c.name.trim().to_lowercase()))
                    .collect();
                info!("Found {} candidate destinations", candidates.len());
                RecommendationUpdate {
                    candidates: Some(candidates),
                    ..update
                }
            }
            Err(e) => {
                debug!("SearchCandidatesNode::run: failure branch");
                warn!("Candidate search failed: {}", e);
                RecommendationUpdate {
                    candidates: Some(Vec::new()),
                    ..update.with_error(format!("Candidate search failed: {}", e))
                }
            }
        }
    }
}

struct FilterByRegionNode;

#[async_trait]
impl Node<RecommendationState> for FilterByRegionNode {
    async fn run(&self, state: &RecommendationState) -> RecommendationUpdate {
        debug!(candidates = state.candidates.len(), "FilterByRegionNode::run: called");
        let filtered = filter_candidates(&state.candidates, state.preference());
        RecommendationUpdate {
            filtered: Some(filtered),
            ..RecommendationUpdate::step(FILTER_BY_REGION, 50, "Filtering destinations...")
        }
    }
}

struct RankAndSelectNode {
    reasoner: Reasoner,
    prompts: Arc<PromptLoader>,
}

#[async_trait]
impl Node<RecommendationState> for RankAndSelectNode {
    async fn run(&self, state: &RecommendationState) -> RecommendationUpdate {
        debug!(filtered = state.filtered.len(), "RankAndSelectNode::run: called");
        let update = RecommendationUpdate::step(RANK_AND_SELECT, 70, "Ranking destinations...");
        if state.filtered.len() <= TOP_N {
            debug!("RankAndSelectNode::run: few candidates branch");
            return RecommendationUpdate {
                ranked: Some(state.filtered.clone()),
                recommendations: Some(state.filtered.clone()),
                ..update
            };
        }

        let mut context = traveller_context(state);
        context.insert("candidates".to_string(), numbered(&state.filtered));
        let reply = match self.prompts.render("rank", &context) {
            Ok(prompt) => self.reasoner.chat(&prompt).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let (ranked, update) = match reply {
            Ok(reply) => (apply_ranking(&reply, &state.filtered), update),
            Err(e) => {
                debug!("RankAndSelectNode::run: call failure branch");
                warn!("Ranking failed, ordering by match score: {}", e);
                (
                    sort_by_match_score(&state.filtered),
                    update.with_error(format!("Ranking failed: {}", e)),
                )
            }
        };
        let top = ranked.iter().take(TOP_N).cloned().collect();
        info!("Selected top {} from {} candidates", TOP_N, ranked.len());
        RecommendationUpdate {
            ranked: Some(ranked),
            recommendations: Some(top),
            ..update
        }
    }
}

struct GenerateReasonsNode {
    reasoner: Reasoner,
    prompts: Arc<PromptLoader>,
}

impl GenerateReasonsNode {
    async fn reasons(&self, state: &RecommendationState) -> BTreeMap<usize, String> {
        let mut context = traveller_context(state);
        context.insert("candidates".to_string(), numbered(&state.recommendations));
        let prompt = match self.prompts.render("reasons", &context) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Failed to render reasons prompt: {}", e);
                return BTreeMap::new();
            }
        };
        match self.reasoner.chat(&prompt).await {
            Ok(reply) => parse_reasons(&reply),
            Err(e) => {
                warn!("Reason generation failed: {}", e);
                BTreeMap::new()
            }
        }
    }
}

#[async_trait]
impl Node<RecommendationState> for GenerateReasonsNode {
    async fn run(&self, state: &RecommendationState) -> RecommendationUpdate {
        debug!(recommendations = state.recommendations.len(), "GenerateReasonsNode::run: called");
        let done = RecommendationUpdate {
            completed: Some(true),
            ..RecommendationUpdate::step(GENERATE_REASONS, 100, "Recommendations ready!")
        };
        let missing = state
            .recommendations
            .iter()
            .any(|c| c.reason.as_deref().is_none_or(|r| r.trim().is_empty()));
        if !missing {
            debug!("GenerateReasonsNode::run: nothing to explain branch");
            return done;
        }

        let reasons = self.reasons(state).await;
        let recommendations = state
            .recommendations
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                let mut candidate = candidate.clone();
                if candidate.reason.as_deref().is_none_or(|r| r.trim().is_empty()) {
                    let reason = reasons.get(&(i + 1)).cloned().unwrap_or_else(|| fallback_reason(&candidate));
                    candidate.reason = Some(reason);
                }
                candidate
            })
            .collect();
        RecommendationUpdate {
            recommendations: Some(recommendations),
            ..done
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockLlmClient, MockReply};
    use std::time::Duration;

    fn candidate(name: &str, country: &str, score: f64) -> Candidate {
        Candidate {
            name: name.to_string(),
            country: country.to_string(),
            match_score: score,
            ..Default::default()
        }
    }

    fn names(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.name.as_str()).collect()
    }

    fn graph(client: MockLlmClient) -> Graph<RecommendationState> {
        let reasoner = Reasoner::new(Arc::new(client), Duration::from_secs(1));
        recommendation_graph(reasoner, Arc::new(PromptLoader::embedded_only())).unwrap()
    }

    #[test]
    fn test_destination_type() {
        assert_eq!(infer_destination_type(Some("Southeast Asia")), DestinationType::Region);
        assert_eq!(infer_destination_type(Some("somewhere with a beach")), DestinationType::Vague);
        assert_eq!(infer_destination_type(Some("Japan")), DestinationType::Country);
        assert_eq!(infer_destination_type(Some("Lisbon")), DestinationType::City);
        assert_eq!(infer_destination_type(Some("  ")), DestinationType::Unknown);
        assert_eq!(infer_destination_type(None), DestinationType::Unknown);
    }

    #[test]
    fn test_search_strategy() {
        let interests = vec!["food".to_string()];
        assert_eq!(search_strategy(Some("Peru"), &interests), SearchStrategy::DestinationFocused);
        assert_eq!(search_strategy(None, &interests), SearchStrategy::InterestFocused);
        assert_eq!(search_strategy(Some(""), &[]), SearchStrategy::General);
    }

    #[test]
    fn test_region_filter() {
        let candidates = vec![
            candidate("Cusco", "Peru", 0.8),
            candidate("Kyoto", "Japan", 0.9),
            candidate("Mendoza", "Argentina", 0.7),
        ];
        assert_eq!(names(&filter_candidates(&candidates, Some("South America"))), vec!["Cusco", "Mendoza"]);
        assert_eq!(names(&filter_candidates(&candidates, Some("kyoto"))), vec!["Kyoto"]);
        // Nothing matches: keep everything
        assert_eq!(filter_candidates(&candidates, Some("Antarctica")).len(), 3);
        assert_eq!(filter_candidates(&candidates, None).len(), 3);
    }

    #[test]
    fn test_apply_ranking() {
        let candidates: Vec<Candidate> = ["A", "B", "C", "D", "E"].iter().map(|n| candidate(n, "X", 0.0)).collect();
        assert_eq!(names(&apply_ranking("[3, 1, 9, 3, 0]", &candidates)), vec!["C", "A", "B", "D", "E"]);
        assert_eq!(names(&apply_ranking("```json\n[5, 4]\n```", &candidates)), vec!["E", "D", "A", "B", "C"]);
        assert_eq!(names(&apply_ranking("I like C best", &candidates)), vec!["A", "B", "C", "D", "E"]);
        assert_eq!(names(&apply_ranking("[]", &candidates)), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_parse_reasons() {
        let reasons = parse_reasons(r#"{"reasons": [{"index": 2, "reason": " Great food "}, {"index": 0, "reason": "x"}, {"index": 3}]}"#);
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[&2], "Great food");
        assert!(parse_reasons("nope").is_empty());
    }

    #[test]
    fn test_parse_candidates_shapes() {
        let bare = parse_candidates(r#"[{"name": "Hoi An", "country": "Vietnam"}, {"name": ""}]"#).unwrap();
        assert_eq!(names(&bare), vec!["Hoi An"]);
        let wrapped = parse_candidates(r#"{"candidates": [{"name": "Hoi An"}]}"#).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert!(parse_candidates("no json").is_err());
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let client = MockLlmClient::texts([
            r#"[{"name": "Kyoto", "country": "Japan", "matchScore": 0.9},
                {"name": "Osaka", "country": "Japan", "matchScore": 0.8},
                {"name": "Seoul", "country": "Korea", "matchScore": 0.7},
                {"name": "Bangkok", "country": "Thailand", "matchScore": 0.6},
                {"name": "Paris", "country": "France", "matchScore": 0.95}]"#,
            r#"[{"index": 1, "reason": "Street food heaven."}]"#,
        ]);
        let state = RecommendationState {
            destination_preference: Some("Asia".to_string()),
            interests: vec!["food".to_string()],
            exclude_names: vec!["osaka".to_string()],
            ..Default::default()
        };

        let run = graph(client).run(state).await.unwrap();
        let result = run.state;
        assert_eq!(run.path.len(), 5);
        assert_eq!(result.intent.as_ref().map(|i| i.destination_type), Some(DestinationType::Region));
        assert_eq!(result.candidates.len(), 4);
        assert_eq!(names(&result.filtered), vec!["Kyoto", "Seoul", "Bangkok"]);
        // Three left after filtering: kept as is without a ranking call
        assert_eq!(names(&result.recommendations), vec!["Kyoto", "Seoul", "Bangkok"]);
        assert!(result.completed);
        assert_eq!(result.progress.percent, 100);
        assert!(result.recommendations.iter().all(|c| c.reason.is_some()));
    }

    #[tokio::test]
    async fn test_ranking_and_reasons() {
        let client = MockLlmClient::texts([
            r#"[{"name": "A", "country": "Peru"}, {"name": "B", "country": "Chile"},
                {"name": "C", "country": "Brazil"}, {"name": "D", "country": "Ecuador"}]"#,
            "[4, 2]",
            r#"[{"index": 2, "reason": "Volcanoes."}]"#,
        ]);
        let run = graph(client).run(RecommendationState::default()).await.unwrap();
        let result = run.state;
        assert_eq!(names(&result.ranked), vec!["D", "B", "A", "C"]);
        assert_eq!(names(&result.recommendations), vec!["D", "B", "A"]);
        assert_eq!(result.recommendations[1].reason.as_deref(), Some("Volcanoes."));
        assert_eq!(
            result.recommendations[0].reason.as_deref(),
            Some("D is a strong match for your interests and travel style.")
        );
    }

    #[tokio::test]
    async fn test_ranking_call_failure_sorts_by_score() {
        let client = MockLlmClient::new(vec![
            MockReply::Text(
                r#"[{"name": "A", "matchScore": 0.2}, {"name": "B", "matchScore": 0.9},
                    {"name": "C", "matchScore": 0.5}, {"name": "D", "matchScore": 0.7}]"#
                    .to_string(),
            ),
            MockReply::Fail("rate limited".to_string()),
            MockReply::Fail("rate limited".to_string()),
        ]);
        let run = graph(client).run(RecommendationState::default()).await.unwrap();
        let result = run.state;
        assert_eq!(names(&result.recommendations), vec!["B", "D", "C"]);
        assert!(result.progress.errors.iter().any(|e| e.starts_with("Ranking failed")));
        assert!(result.completed);
    }

    #[tokio::test]
    async fn test_search_failure_completes_empty() {
        let client = MockLlmClient::new(vec![MockReply::Fail("down".to_string())]);
        let run = graph(client).run(RecommendationState::default()).await.unwrap();
        assert!(run.state.candidates.is_empty());
        assert!(run.state.recommendations.is_empty());
        assert!(run.state.completed);
        assert_eq!(run.state.progress.errors.len(), 1);
    }
}
