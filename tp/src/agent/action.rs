//! Free-text action parsing for the reasoning loop
//!
//! Two tiers: a structured `Action: <token>` line wins; otherwise a keyword
//! table maps the response onto a known action; otherwise the search action.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static ACTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Action:\s*([\w_]+)").expect("action pattern compiles"));
static THOUGHT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)Thought:\s*(.*?)(?:\n\s*Action:|$)").expect("thought pattern compiles"));

/// Keyword fallback table, checked in order
const KEYWORDS: &[(&[&str], AgentAction)] = &[
    (&["search", "attraction"], AgentAction::SearchAttractions),
    (&["budget", "validate"], AgentAction::ValidateBudget),
    (&["generate", "itinerary"], AgentAction::GenerateItinerary),
    (&["finish", "complete"], AgentAction::Finish),
];

/// What the loop does next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    SearchAttractions,
    ValidateBudget,
    GenerateItinerary,
    GeocodeLocations,
    SearchNearby,
    Finish,
    /// Structured token naming no known action; dispatched to the registry as is
    Other(String),
}

impl AgentAction {
    /// The action taken when nothing else can be determined
    pub const DEFAULT: AgentAction = AgentAction::SearchAttractions;

    pub fn as_str(&self) -> &str {
        match self {
            AgentAction::SearchAttractions => "search_attractions",
            AgentAction::ValidateBudget => "validate_budget",
            AgentAction::GenerateItinerary => "generate_itinerary",
            AgentAction::GeocodeLocations => "geocode_locations",
            AgentAction::SearchNearby => "search_nearby",
            AgentAction::Finish => "FINISH",
            AgentAction::Other(name) => name,
        }
    }

    /// Map a structured token onto an action
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "search_attractions" => AgentAction::SearchAttractions,
            "validate_budget" => AgentAction::ValidateBudget,
            "generate_itinerary" => AgentAction::GenerateItinerary,
            "geocode_locations" => AgentAction::GeocodeLocations,
            "search_nearby" => AgentAction::SearchNearby,
            "finish" => AgentAction::Finish,
            _ => AgentAction::Other(token.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == AgentAction::Finish
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thought and action extracted from one reasoning response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub thought: String,
    pub action: AgentAction,
}

/// Resolve the action of a response; never fails
pub fn parse_action(response: &str) -> AgentAction {
    debug!(len = response.len(), "parse_action: called");
    if let Some(captures) = ACTION_PATTERN.captures(response) {
        return AgentAction::from_token(&captures[1]);
    }

    let lower = response.to_lowercase();
    for (keywords, action) in KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            debug!(action = %action, "parse_action: keyword fallback branch");
            return action.clone();
        }
    }
    debug!("parse_action: default action branch");
    AgentAction::DEFAULT
}

/// Text after `Thought:` up to the action line, or the whole response
pub fn parse_thought(response: &str) -> String {
    THOUGHT_PATTERN
        .captures(response)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| response.trim().to_string())
}

pub fn parse_response(response: &str) -> ParsedResponse {
    ParsedResponse {
        thought: parse_thought(response),
        action: parse_action(response),
    }
}

/// True iff the last `threshold` actions exist and are all equal
pub fn is_looping<S: AsRef<str>>(actions: &[S], threshold: usize) -> bool {
    if threshold == 0 || actions.len() < threshold {
        return false;
    }
    let tail = &actions[actions.len() - threshold..];
    tail.iter().all(|a| a.as_ref() == tail[0].as_ref())
}

/// Shorten `text` to `max_chars`, marking the cut with `...`
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
