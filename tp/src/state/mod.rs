//! Planning state records
//!
//! `PlanState` carries a planning session from its request to the final
//! itinerary; `RecommendationState` carries the destination recommendation
//! workflow. Both embed the same `Progress` block and are only ever advanced
//! by merging typed partial updates into fresh copies.

mod itinerary;
mod plan;
mod price;
mod recommendation;
mod request;

pub use itinerary::{ActivityPlan, ActivityType, Attraction, BudgetCheck, Coordinates, DayPlan, Poi};
pub use plan::{Metadata, PlanState, PlanUpdate, Progress, ProgressUpdate, StepRecord};
pub use price::parse_price;
pub use recommendation::{
    Candidate, DestinationType, Intent, RecommendationState, RecommendationUpdate, SearchStrategy,
};
pub use request::{MAX_TRIP_DAYS, PlanRequestError, RecommendationRequest, TripRequest};
