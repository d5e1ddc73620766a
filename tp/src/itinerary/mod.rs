//! Itinerary drafting and route ordering
//!
//! The generator turns a plan state into day plans through the reasoning
//! collaborator, geocodes the new activity locations and reprices the
//! result. Route ordering is pure and only needs the geocode table.

mod generator;
mod route;

pub use generator::{GenerationError, ItineraryGenerator, parse_itinerary};
pub use route::{BUFFER_MINUTES, MIN_GEOCODED_STOPS, RouteReport, optimize_day, optimize_routes};
