//! Plan validation
//!
//! Independent checkers score a generated itinerary on structure, budget,
//! timing, geography and diversity, optionally followed by a natural-language
//! review. Their issues are severity-sorted into a [`ReflectionResult`] whose
//! `approved` flag drives the planning graph's regenerate-or-finalize edge.

mod checks;
mod geo;
mod holistic;
mod issue;
mod validator;

pub use checks::{
    check_budget, check_diversity, check_geography, check_structure, check_timing, parse_start_minutes,
};
pub use geo::{EARTH_RADIUS_KM, TRAVEL_SPEED_KMH, haversine_km, travel_minutes};
pub use holistic::HolisticReview;
pub use issue::{IssueCategory, IssueSeverity, ReflectionResult, ValidationIssue};
pub use validator::PlanValidator;
