//! Caller-supplied parameters and their contract checks

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::plan::PlanState;
use super::recommendation::RecommendationState;

/// Longest trip the planner accepts
pub const MAX_TRIP_DAYS: u32 = 30;

/// Rejections raised before any pipeline starts
#[derive(Debug, Error, PartialEq)]
pub enum PlanRequestError {
    #[error("Destination is required")]
    MissingDestination,

    #[error("Trip length must be between 1 and {max} days, got {days}")]
    InvalidDays { days: u32, max: u32 },

    #[error("Budget must be a positive amount, got {0}")]
    InvalidBudget(f64),

    #[error("Party size must be at least 1")]
    InvalidPartySize,

    #[error("Budget level must be 1, 2 or 3, got {0}")]
    InvalidBudgetLevel(u8),
}

/// Trip parameters for the planning pipeline and reasoning loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    #[serde(default)]
    pub country: Option<String>,
    pub days: u32,
    pub budget: f64,
    #[serde(default = "default_party_size")]
    pub party_size: u32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferences: Option<String>,
}

fn default_party_size() -> u32 {
    debug!("default_party_size: called");
    1
}

impl TripRequest {
    pub fn new(destination: impl Into<String>, days: u32, budget: f64) -> Self {
        Self {
            destination: destination.into(),
            country: None,
            days,
            budget,
            party_size: default_party_size(),
            start_date: None,
            preferences: None,
        }
    }

    pub fn validate(&self) -> Result<(), PlanRequestError> {
        debug!(destination = %self.destination, days = self.days, budget = self.budget, "TripRequest::validate: called");
        if self.destination.trim().is_empty() {
            debug!("TripRequest::validate: missing destination branch");
            return Err(PlanRequestError::MissingDestination);
        }
        if self.days == 0 || self.days > MAX_TRIP_DAYS {
            debug!("TripRequest::validate: invalid days branch");
            return Err(PlanRequestError::InvalidDays {
                days: self.days,
                max: MAX_TRIP_DAYS,
            });
        }
        if !self.budget.is_finite() || self.budget <= 0.0 {
            debug!("TripRequest::validate: invalid budget branch");
            return Err(PlanRequestError::InvalidBudget(self.budget));
        }
        if self.party_size == 0 {
            debug!("TripRequest::validate: invalid party size branch");
            return Err(PlanRequestError::InvalidPartySize);
        }
        Ok(())
    }

    /// Build the initial state for a validated request
    pub fn into_state(self) -> Result<PlanState, PlanRequestError> {
        debug!(destination = %self.destination, "TripRequest::into_state: called");
        self.validate()?;
        Ok(PlanState {
            plan_id: uuid::Uuid::now_v7().to_string(),
            destination: self.destination.trim().to_string(),
            destination_country: self.country.filter(|c| !c.trim().is_empty()),
            duration_days: self.days,
            budget: self.budget,
            party_size: self.party_size,
            start_date: self.start_date,
            preferences: self.preferences.filter(|p| !p.trim().is_empty()),
            ..Default::default()
        })
    }
}

/// Preferences for the recommendation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationRequest {
    pub destination_preference: Option<String>,
    pub interests: Vec<String>,
    pub mood: Option<String>,
    pub budget_level: u8,
    pub days: u32,
    pub exclude_names: Vec<String>,
}

impl Default for RecommendationRequest {
    fn default() -> Self {
        Self {
            destination_preference: None,
            interests: Vec::new(),
            mood: None,
            budget_level: 2,
            days: 5,
            exclude_names: Vec::new(),
        }
    }
}

impl RecommendationRequest {
    pub fn into_state(self) -> Result<RecommendationState, PlanRequestError> {
        debug!(?self.destination_preference, "RecommendationRequest::into_state: called");
        if !(1..=3).contains(&self.budget_level) {
            return Err(PlanRequestError::InvalidBudgetLevel(self.budget_level));
        }
        if self.days == 0 || self.days > MAX_TRIP_DAYS {
            return Err(PlanRequestError::InvalidDays {
                days: self.days,
                max: MAX_TRIP_DAYS,
            });
        }
        Ok(RecommendationState {
            destination_preference: self.destination_preference,
            interests: self.interests,
            mood: self.mood,
            budget_level: self.budget_level,
            days: self.days,
            exclude_names: self.exclude_names,
            ..Default::default()
        })
    }
}
