//! PlanState - the record threaded through planning
//!
//! Every field has a fixed type and a default. Nodes and loop iterations
//! never mutate a state in place: they return a [`PlanUpdate`] and the
//! caller folds it in with [`PlanState::merge`], which yields a new version.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::itinerary::{Attraction, BudgetCheck, Coordinates, DayPlan, Poi};
use crate::validation::ReflectionResult;

/// Progress markers shared by every workflow state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub current_step: String,
    /// 0-100
    pub percent: u8,
    pub message: String,
    /// Non-fatal errors recorded along the way
    pub errors: Vec<String>,
}

impl Progress {
    /// Fold a progress update into a copy of these markers
    pub fn apply(&self, update: &ProgressUpdate) -> Self {
        let mut next = self.clone();
        if let Some(step) = &update.current_step {
            next.current_step = step.clone();
        }
        if let Some(percent) = update.percent {
            next.percent = percent.min(100);
        }
        if let Some(message) = &update.message {
            next.message = message.clone();
        }
        next.errors.extend(update.errors.iter().cloned());
        next
    }
}

/// Partial progress update; errors append, everything else replaces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub current_step: Option<String>,
    pub percent: Option<u8>,
    pub message: Option<String>,
    pub errors: Vec<String>,
}

/// One think/act/observe record of the reasoning loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub iteration: u32,
    pub thought: String,
    pub action: String,
    pub observation: String,
    pub success: bool,
}

/// Free-form metadata; execution history has its own slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub react_history: Vec<StepRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full planning state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanState {
    pub plan_id: String,
    /// Incremented on every merge
    pub version: u64,

    pub destination: String,
    pub destination_country: Option<String>,
    pub duration_days: u32,
    pub budget: f64,
    pub party_size: u32,
    pub start_date: Option<NaiveDate>,
    pub preferences: Option<String>,

    pub progress: Progress,
    pub plan_steps: Vec<String>,
    pub step_count: u32,

    pub attractions: Vec<Attraction>,
    /// Location text -> geocode
    pub geo_data: BTreeMap<String, Coordinates>,
    pub budget_check: Option<BudgetCheck>,
    pub points_of_interest: Vec<Poi>,
    pub itinerary: Vec<DayPlan>,

    pub reflection_count: u32,
    pub approved: bool,
    pub issues: Vec<String>,
    pub revision_suggestions: Vec<String>,
    pub validation: Option<ReflectionResult>,

    pub metadata: Metadata,
}

impl PlanState {
    /// Produce the next version of the state with `update` applied
    ///
    /// `Some` fields replace, `geo_data` and metadata entries are merged
    /// key by key, and progress errors append.
    pub fn merge(&self, update: PlanUpdate) -> PlanState {
        debug!(plan_id = %self.plan_id, version = self.version, "PlanState::merge: called");
        let mut next = self.clone();
        next.version = self.version + 1;
        next.progress = self.progress.apply(&update.progress);

        if let Some(steps) = update.plan_steps {
            next.plan_steps = steps;
        }
        if let Some(count) = update.step_count {
            next.step_count = count;
        }
        if let Some(attractions) = update.attractions {
            next.attractions = attractions;
        }
        if let Some(geo) = update.geo_data {
            debug!(entries = geo.len(), "PlanState::merge: geo_data branch");
            next.geo_data.extend(geo);
        }
        if let Some(check) = update.budget_check {
            next.budget_check = Some(check);
        }
        if let Some(pois) = update.points_of_interest {
            next.points_of_interest = pois;
        }
        if let Some(itinerary) = update.itinerary {
            next.itinerary = itinerary;
        }
        if let Some(count) = update.reflection_count {
            next.reflection_count = count;
        }
        if let Some(approved) = update.approved {
            next.approved = approved;
        }
        if let Some(issues) = update.issues {
            next.issues = issues;
        }
        if let Some(suggestions) = update.revision_suggestions {
            next.revision_suggestions = suggestions;
        }
        if let Some(validation) = update.validation {
            next.validation = Some(validation);
        }
        if let Some(history) = update.react_history {
            next.metadata.react_history = history;
        }
        next.metadata.extra.extend(update.metadata);
        next
    }

    pub fn has_itinerary(&self) -> bool {
        !self.itinerary.is_empty()
    }

    /// Destination with country, as used for location lookups
    pub fn destination_context(&self) -> String {
        match self.destination_country.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(country) => format!("{}, {}", self.destination, country),
            None => self.destination.clone(),
        }
    }

    /// Successful geocode for a location key
    pub fn point_for(&self, key: &str) -> Option<(f64, f64)> {
        self.geo_data.get(key).and_then(Coordinates::point)
    }

    pub fn total_activities(&self) -> usize {
        self.itinerary.iter().map(|d| d.activities.len()).sum()
    }
}

/// Typed partial update to a [`PlanState`]
#[derive(Debug, Clone, Default)]
pub struct PlanUpdate {
    pub progress: ProgressUpdate,
    pub plan_steps: Option<Vec<String>>,
    pub step_count: Option<u32>,
    pub attractions: Option<Vec<Attraction>>,
    pub geo_data: Option<BTreeMap<String, Coordinates>>,
    pub budget_check: Option<BudgetCheck>,
    pub points_of_interest: Option<Vec<Poi>>,
    pub itinerary: Option<Vec<DayPlan>>,
    pub reflection_count: Option<u32>,
    pub approved: Option<bool>,
    pub issues: Option<Vec<String>>,
    pub revision_suggestions: Option<Vec<String>>,
    pub validation: Option<ReflectionResult>,
    pub react_history: Option<Vec<StepRecord>>,
    pub metadata: Map<String, Value>,
}

impl PlanUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current step, percentage and progress message
    pub fn step(mut self, step: impl Into<String>, percent: u8, message: impl Into<String>) -> Self {
        self.progress.current_step = Some(step.into());
        self.progress.percent = Some(percent);
        self.progress.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.progress.errors.push(error.into());
        self
    }

    pub fn with_attractions(mut self, attractions: Vec<Attraction>) -> Self {
        self.attractions = Some(attractions);
        self
    }

    pub fn with_geo_data(mut self, geo: BTreeMap<String, Coordinates>) -> Self {
        self.geo_data = Some(geo);
        self
    }

    pub fn with_budget_check(mut self, check: BudgetCheck) -> Self {
        self.budget_check = Some(check);
        self
    }

    pub fn with_itinerary(mut self, itinerary: Vec<DayPlan>) -> Self {
        self.itinerary = Some(itinerary);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
