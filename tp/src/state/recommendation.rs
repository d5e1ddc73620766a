//! RecommendationState - destination recommendation workflow record

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use super::plan::{Progress, ProgressUpdate};

/// How specific the destination preference is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    Region,
    Vague,
    Country,
    City,
    #[default]
    Unknown,
}

/// What drives candidate generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStrategy {
    DestinationFocused,
    InterestFocused,
    #[default]
    General,
}

/// Result of intent analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub destination_type: DestinationType,
    pub search_strategy: SearchStrategy,
}

/// A candidate destination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    pub name: String,
    pub country: String,
    pub description: String,
    #[serde(deserialize_with = "features")]
    pub features: Vec<String>,
    #[serde(deserialize_with = "budget_level")]
    pub budget_level: Option<u8>,
    #[serde(deserialize_with = "match_score")]
    pub match_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn features<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|f| f.trim().to_string()).filter(|f| !f.is_empty()).collect(),
        _ => Vec::new(),
    })
}

fn budget_level<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64().map(|v| v.round().clamp(1.0, 3.0) as u8),
        Some(Value::String(s)) => s.trim().parse::<u8>().ok().map(|v| v.clamp(1, 3)),
        _ => None,
    })
}

fn match_score<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or_default(),
        _ => 0.0,
    })
}

/// Full recommendation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationState {
    pub version: u64,

    pub destination_preference: Option<String>,
    pub interests: Vec<String>,
    pub mood: Option<String>,
    /// 1 = low, 2 = medium, 3 = high
    pub budget_level: u8,
    pub days: u32,
    pub exclude_names: Vec<String>,

    pub progress: Progress,
    pub intent: Option<Intent>,
    pub candidates: Vec<Candidate>,
    pub filtered: Vec<Candidate>,
    pub ranked: Vec<Candidate>,
    pub recommendations: Vec<Candidate>,
    pub completed: bool,
}

impl Default for RecommendationState {
    fn default() -> Self {
        Self {
            version: 0,
            destination_preference: None,
            interests: Vec::new(),
            mood: None,
            budget_level: 2,
            days: 5,
            exclude_names: Vec::new(),
            progress: Progress::default(),
            intent: None,
            candidates: Vec::new(),
            filtered: Vec::new(),
            ranked: Vec::new(),
            recommendations: Vec::new(),
            completed: false,
        }
    }
}

impl RecommendationState {
    pub fn merge(&self, update: RecommendationUpdate) -> RecommendationState {
        debug!(version = self.version, "RecommendationState::merge: called");
        let mut next = self.clone();
        next.version = self.version + 1;
        next.progress = self.progress.apply(&update.progress);
        if let Some(intent) = update.intent {
            next.intent = Some(intent);
        }
        if let Some(candidates) = update.candidates {
            next.candidates = candidates;
        }
        if let Some(filtered) = update.filtered {
            next.filtered = filtered;
        }
        if let Some(ranked) = update.ranked {
            next.ranked = ranked;
        }
        if let Some(recommendations) = update.recommendations {
            next.recommendations = recommendations;
        }
        if let Some(completed) = update.completed {
            next.completed = completed;
        }
        next
    }

    /// Trimmed, non-empty destination preference
    pub fn preference(&self) -> Option<&str> {
        self.destination_preference
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Typed partial update to a [`RecommendationState`]
#[derive(Debug, Clone, Default)]
pub struct RecommendationUpdate {
    pub progress: ProgressUpdate,
    pub intent: Option<Intent>,
    pub candidates: Option<Vec<Candidate>>,
    pub filtered: Option<Vec<Candidate>>,
    pub ranked: Option<Vec<Candidate>>,
    pub recommendations: Option<Vec<Candidate>>,
    pub completed: Option<bool>,
}

impl RecommendationUpdate {
    pub fn step(step: impl Into<String>, percent: u8, message: impl Into<String>) -> Self {
        Self {
            progress: ProgressUpdate {
                current_step: Some(step.into()),
                percent: Some(percent),
                message: Some(message.into()),
                errors: Vec::new(),
            },
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.progress.errors.push(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = RecommendationState::default();
        assert_eq!(state.budget_level, 2);
        assert_eq!(state.days, 5);
        assert!(!state.completed);
        assert_eq!(state.preference(), None);
    }

    #[test]
    fn test_candidate_lenient_fields() {
        let json = r#"{"name": "Cusco", "country": "Peru", "features": "hiking, ruins",
                       "budgetLevel": "2", "matchScore": "88%"}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.features, vec!["hiking", "ruins"]);
        assert_eq!(candidate.budget_level, Some(2));
        assert_eq!(candidate.match_score, 88.0);
        assert_eq!(candidate.description, "");
    }

    #[test]
    fn test_merge_bumps_version() {
        let state = RecommendationState::default();
        let next = state.merge(RecommendationUpdate {
            completed: Some(true),
            ..RecommendationUpdate::step("done", 100, "Done")
        });
        assert_eq!(next.version, 1);
        assert!(next.completed);
        assert!(!state.completed);
        assert_eq!(next.progress.percent, 100);
    }
}
